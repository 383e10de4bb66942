use argh::FromArgs;
use std::time::Duration;

use crate::listing::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

#[derive(FromArgs, Debug, Default)]
/// QA Console: a web console for the QA test-management backend.
pub struct Args {
    /// host to bind to
    #[argh(option, default = "String::from(\"127.0.0.1\")")]
    pub host: String,

    /// port to listen on (0 for random available port)
    #[argh(option, short = 'p', default = "0")]
    pub port: u16,

    /// base URL of the backend REST API (env: QA_API_URL)
    #[argh(option)]
    pub api_url: Option<String>,

    /// rows per page in list screens
    #[argh(option, default = "DEFAULT_PAGE_SIZE")]
    pub page_size: usize,

    /// backend request timeout in seconds
    #[argh(option, default = "30")]
    pub timeout_secs: u64,

    /// open the browser automatically
    #[argh(switch, short = 'o')]
    pub open: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub api_url: String,
    pub page_size: usize,
    pub timeout: Duration,
    pub open: bool,
}

impl Config {
    /// Command-line flags win over the environment, which wins over defaults.
    pub fn from_args(args: Args) -> Self {
        let api_url = args
            .api_url
            .or_else(|| std::env::var("QA_API_URL").ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            host: args.host,
            port: args.port,
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            page_size: args.page_size.max(1),
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            open: args.open,
        }
    }

    /// Settings for pointing the console at a given backend, e.g. in tests.
    pub fn for_backend(api_url: &str) -> Self {
        Self::from_args(Args {
            host: "127.0.0.1".to_string(),
            api_url: Some(api_url.to_string()),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: 5,
            ..Default::default()
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_backend(DEFAULT_API_URL)
    }
}
