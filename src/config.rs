use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let sqlite_path =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "/opt/linkboard/data.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| "xK2dVq8mRbTUwYpe4FnH".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "token".to_string());

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}", path)
    }
}
