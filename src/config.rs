use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use clap::Args;
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub struct FlatConfig {
    #[arg(long, env = "JOURNAL_WORKDIR", default_value = ".", help = "Directory holding the journal DB log")]
    workdir: PathBuf,

    #[arg(long, env = "JOURNAL_HOST", default_value = "127.0.0.1", help = "Address to listen on")]
    host: String,

    #[arg(long, env = "JOURNAL_PORT", default_value_t = 5000, help = "Port to listen on")]
    port: u16,

    #[arg(long, env = "JOURNAL_LOG_LEVEL", default_value = "info", help = "off, error, warn, info, debug or trace")]
    log_level: LevelFilter,

    #[arg(long, env = "JOURNAL_SESSION_IDLE_MINUTES", default_value_t = 1440, value_parser = clap::value_parser!(u32).range(1..),
        help = "Log users out after this many idle minutes")]
    session_idle_minutes: u32,

    #[arg(long, env = "JOURNAL_SECURE_COOKIES", default_value_t = false, help = "Only send the session cookie over HTTPS")]
    secure_cookies: bool,

    #[arg(long, env = "JOURNAL_SEED_USER", value_parser = parse_seed_user, help = "Account created on startup, as name:password")]
    seed_user: Option<SeedUser>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfiguration,
    pub db: DbConfiguration,
    pub session: SessionConfiguration,
    pub seed: Option<SeedUser>,
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone)]
pub struct ServerConfiguration {
    pub host: String, // JOURNAL_HOST
    pub port: u16, // JOURNAL_PORT
}

impl ServerConfiguration {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DbConfiguration {
    pub workdir: PathBuf, // JOURNAL_WORKDIR
}

#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    pub idle_minutes: u32, // JOURNAL_SESSION_IDLE_MINUTES
    pub secure_cookies: bool, // JOURNAL_SECURE_COOKIES
}

#[derive(Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

impl Debug for SeedUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn parse_seed_user(value: &str) -> Result<SeedUser, String> {
    match value.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => Ok(SeedUser {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err("expected name:password".to_string()),
    }
}

impl From<FlatConfig> for Config {
    fn from(value: FlatConfig) -> Self {
        Config {
            server: ServerConfiguration {
                host: value.host,
                port: value.port,
            },
            db: DbConfiguration {
                workdir: value.workdir,
            },
            session: SessionConfiguration {
                idle_minutes: value.session_idle_minutes,
                secure_cookies: value.secure_cookies,
            },
            seed: value.seed_user,
            log_level: value.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: FlatConfig,
    }

    fn parse(args: &[&str]) -> Config {
        let args = std::iter::once("journal").chain(args.iter().copied());
        TestCli::try_parse_from(args).unwrap().config.into()
    }

    #[test]
    fn test_explicit_flags() {
        let config = parse(&["--workdir", "/tmp/j", "--host", "0.0.0.0", "--port", "8080", "--log-level", "debug",
            "--session-idle-minutes", "5", "--secure-cookies", "--seed-user", "josh:123"]);
        assert_eq!(config.db.workdir, PathBuf::from("/tmp/j"));
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.session.idle_minutes, 5);
        assert!(config.session.secure_cookies);
        assert_eq!(config.seed, Some(SeedUser { username: "josh".to_string(), password: "123".to_string() }));
    }

    #[test]
    fn test_session_idle_minutes_must_be_positive() {
        for value in ["0", "-5", "soon"] {
            let arg = format!("--session-idle-minutes={}", value);
            assert!(TestCli::try_parse_from(["journal", arg.as_str()]).is_err(), "{}", value);
        }
        assert_eq!(parse(&["--session-idle-minutes=1"]).session.idle_minutes, 1);
    }

    #[test]
    fn test_seed_user_format() {
        assert!(parse_seed_user("josh:12:3").is_ok_and(|x| x.password == "12:3"));
        assert!(parse_seed_user("josh").is_err());
        assert!(parse_seed_user(":123").is_err());
        assert!(parse_seed_user("josh:").is_err());
    }

    #[test]
    fn test_seed_password_is_masked() {
        let seed = SeedUser { username: "josh".to_string(), password: "hunter2".to_string() };
        let printed = format!("{:?}", seed);
        assert!(printed.contains("josh"));
        assert!(!printed.contains("hunter2"));
    }
}
