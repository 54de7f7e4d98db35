//! Acting-user resolution for CLI commands.
//!
//! The resolution chain: `--user` flag > `TALLY_USER` env > user config
//! `user` > `USER` env (TTY only). The resolved id is then looked up in the
//! project's `[[users]]` directory; an id that is not listed resolves to no
//! user at all and every operation fails closed.

use std::env;
use tally_core::StaticIdentity;
use tally_core::identity::Directory;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_id_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("TALLY_USER") {
        return Some(val);
    }

    if let Some(user) = configured.filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    // USER only counts for interactive sessions
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the claimed user id following the chain in the module docs.
pub fn resolve_user_id(cli_flag: Option<&str>, configured: Option<&str>) -> Option<String> {
    resolve_user_id_with(cli_flag, configured, &RealEnv)
}

/// Resolve the acting user against the project directory.
pub fn resolve_identity(
    directory: &Directory,
    cli_flag: Option<&str>,
    configured: Option<&str>,
) -> StaticIdentity {
    let claimed = resolve_user_id(cli_flag, configured);
    directory.resolve(claimed.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tally_core::IdentityContext;
    use tally_core::model::User;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("TALLY_USER", "env-user");
        let result = resolve_user_id_with(Some("flag-user"), Some("cfg-user"), &env);
        assert_eq!(result.as_deref(), Some("flag-user"));
    }

    #[test]
    fn env_beats_user_config() {
        let env = MockEnv::new().var("TALLY_USER", "env-user");
        let result = resolve_user_id_with(None, Some("cfg-user"), &env);
        assert_eq!(result.as_deref(), Some("env-user"));
    }

    #[test]
    fn user_config_beats_login_name() {
        let env = MockEnv::new().var("USER", "login").tty();
        let result = resolve_user_id_with(Some(""), Some("cfg-user"), &env);
        assert_eq!(result.as_deref(), Some("cfg-user"));
    }

    #[test]
    fn login_name_only_in_tty() {
        let env = MockEnv::new().var("USER", "bob");
        assert_eq!(resolve_user_id_with(None, None, &env), None);

        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_user_id_with(None, None, &env).as_deref(), Some("bob"));
    }

    #[test]
    fn unlisted_user_resolves_to_nobody() {
        let directory = Directory::new(vec![User::admin("root")]);
        let identity = resolve_identity(&directory, Some("mallory"), None);
        assert!(identity.current_user().is_none());
        let identity = resolve_identity(&directory, Some("root"), None);
        assert!(identity.current_user().is_some_and(|u| u.is_admin()));
    }
}
