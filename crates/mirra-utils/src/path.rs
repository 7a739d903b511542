use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

/// Resolves a path string that may contain environment variables.
///
/// Expands `$VAR` and `${VAR}`, resolves a leading `~` to the home directory
/// and makes relative paths absolute against the current directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] for a `${` without its `}`
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();

    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let path_buf = PathBuf::from(expand_variables(path)?);

    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path_buf))
            .map_err(|err| PathError::CurrentDir { source: err })
    }
}

pub fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
}

pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

pub fn xdg_data_home() -> PathBuf {
    env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

fn expand_variables(path: &str) -> PathResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut var_name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    var_name.push(c);
                }
                if !closed {
                    return Err(PathError::UnclosedVariable {
                        input: format!("${{{var_name}"),
                    });
                }
                expand_env_var(&var_name, &mut result, path)?;
            }
            '$' => {
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push('$');
                } else {
                    expand_env_var(&var_name, &mut result, path)?;
                }
            }
            '~' if result.is_empty() => result.push_str(&home_dir().to_string_lossy()),
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn expand_env_var(var_name: &str, result: &mut String, original: &str) -> PathResult<()> {
    match var_name {
        "HOME" => result.push_str(&home_dir().to_string_lossy()),
        "XDG_CONFIG_HOME" => result.push_str(&xdg_config_home().to_string_lossy()),
        "XDG_DATA_HOME" => result.push_str(&xdg_data_home().to_string_lossy()),
        _ => {
            let value = env::var(var_name).map_err(|_| {
                PathError::MissingEnvVar {
                    var: var_name.into(),
                    input: original.into(),
                }
            })?;
            result.push_str(&value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_resolve_path_expands_variables() {
        env::set_var("MIRRA_TEST_DIR", "/srv/mirra");
        assert_eq!(
            resolve_path("$MIRRA_TEST_DIR/backup").unwrap(),
            PathBuf::from("/srv/mirra/backup")
        );
        assert_eq!(
            resolve_path("${MIRRA_TEST_DIR}/data").unwrap(),
            PathBuf::from("/srv/mirra/data")
        );
        env::remove_var("MIRRA_TEST_DIR");
    }

    #[test]
    #[serial]
    fn test_resolve_path_errors() {
        assert!(matches!(resolve_path("  "), Err(PathError::Empty)));
        assert!(matches!(
            resolve_path("${UNCLOSED"),
            Err(PathError::UnclosedVariable { .. })
        ));
        env::remove_var("MIRRA_SURELY_MISSING");
        assert!(matches!(
            resolve_path("$MIRRA_SURELY_MISSING/x"),
            Err(PathError::MissingEnvVar { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_tilde_and_relative() {
        let home = home_dir().to_string_lossy().to_string();
        assert_eq!(
            resolve_path("~/cache").unwrap(),
            PathBuf::from(format!("{home}/cache"))
        );
        let relative = resolve_path("data").unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("data"));
    }
}
