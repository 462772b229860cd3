//! The application user the delivery service connects as.

use async_trait::async_trait;
use delivery_db::{NewUser, Pipeline, RoleGrant, Step, StepOutcome, StepOutput, Store};
use delivery_kernel::secrets::{self, SecretError};
use delivery_kernel::settings::{Environment, Settings};
use thiserror::Error;

use crate::bootstrap::BootstrapPlan;

/// Password used when nothing else is configured. Local environment only.
pub const DEV_PASSWORD: &str = "stud";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(
        "no password configured for application user '{username}' in the {environment:?} environment; \
         set app_user.password_file or DELIVERY_APP_USER__PASSWORD"
    )]
    MissingPassword {
        username: String,
        environment: Environment,
    },

    #[error("application user '{0}' has no roles")]
    NoRoles(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Build the credential from settings.
///
/// Password precedence: `app_user.password_file`, then `app_user.password`,
/// then [`DEV_PASSWORD`] when running in the local environment.
/// Roles without an explicit database are scoped to the target database.
pub fn resolve_app_user(settings: &Settings) -> Result<NewUser, CredentialError> {
    let app_user = &settings.app_user;

    if app_user.roles.is_empty() {
        return Err(CredentialError::NoRoles(app_user.username.clone()));
    }

    let password = match (&app_user.password_file, &app_user.password) {
        (Some(path), _) => secrets::load_file("app_user.password", path)?,
        (None, Some(password)) if !password.is_empty() => password.clone(),
        _ if settings.environment == Environment::Local => {
            tracing::warn!(
                username = %app_user.username,
                "no application user password configured, using the development default"
            );
            DEV_PASSWORD.to_string()
        }
        _ => {
            return Err(CredentialError::MissingPassword {
                username: app_user.username.clone(),
                environment: settings.environment,
            })
        }
    };

    let roles = app_user
        .roles
        .iter()
        .map(|role| {
            RoleGrant::new(
                role.role.clone(),
                role.db.clone().unwrap_or_else(|| settings.database.name.clone()),
            )
        })
        .collect();

    Ok(NewUser {
        username: app_user.username.clone(),
        password,
        roles,
    })
}

/// Creates the application user. Fails if the user already exists.
pub struct CreateAppUser {
    user: NewUser,
}

#[async_trait]
impl Step for CreateAppUser {
    fn name(&self) -> &'static str {
        "create_app_user"
    }

    async fn run(&self, store: &dyn Store) -> anyhow::Result<StepOutcome> {
        store.create_user(&self.user).await?;

        let roles: Vec<String> = self
            .user
            .roles
            .iter()
            .map(|grant| format!("{}@{}", grant.role, grant.db))
            .collect();

        Ok(StepOutcome::completed(format!(
            "created user '{}' with roles {}",
            self.user.username,
            roles.join(", ")
        ))
        .with_output(StepOutput::User(self.user.username.clone())))
    }
}

/// Register the application user step; it runs after the delivery steps.
pub fn register(pipeline: &mut Pipeline, plan: &BootstrapPlan) {
    pipeline.register(CreateAppUser {
        user: plan.app_user.clone(),
    });
}

#[cfg(test)]
mod tests {
    use delivery_db::MemoryStore;
    use delivery_kernel::settings::RoleSettings;

    use super::*;

    #[test]
    fn local_environment_falls_back_to_development_password() {
        let settings = Settings::default();
        let user = resolve_app_user(&settings).unwrap();

        assert_eq!(user.username, "stud");
        assert_eq!(user.password, DEV_PASSWORD);
        assert_eq!(user.roles, vec![RoleGrant::new("readWrite", "delivery_db")]);
    }

    #[test]
    fn production_requires_an_explicit_password() {
        let settings = Settings {
            environment: Environment::Production,
            ..Settings::default()
        };

        let err = resolve_app_user(&settings).unwrap_err();
        assert!(matches!(err, CredentialError::MissingPassword { .. }));
    }

    #[test]
    fn configured_password_is_used() {
        let mut settings = Settings {
            environment: Environment::Production,
            ..Settings::default()
        };
        settings.app_user.password = Some("from-env".to_string());

        assert_eq!(resolve_app_user(&settings).unwrap().password, "from-env");
    }

    #[test]
    fn password_file_wins_over_inline_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stud_password");
        std::fs::write(&path, "from-file\n").unwrap();

        let mut settings = Settings::default();
        settings.app_user.password = Some("inline".to_string());
        settings.app_user.password_file = Some(path);

        assert_eq!(resolve_app_user(&settings).unwrap().password, "from-file");
    }

    #[test]
    fn roles_default_to_target_database() {
        let mut settings = Settings::default();
        settings.database.name = "other_db".to_string();
        settings.app_user.roles = vec![
            RoleSettings {
                role: "readWrite".to_string(),
                db: None,
            },
            RoleSettings {
                role: "read".to_string(),
                db: Some("reporting".to_string()),
            },
        ];

        let user = resolve_app_user(&settings).unwrap();
        assert_eq!(
            user.roles,
            vec![
                RoleGrant::new("readWrite", "other_db"),
                RoleGrant::new("read", "reporting"),
            ]
        );
    }

    #[test]
    fn empty_role_list_is_rejected() {
        let mut settings = Settings::default();
        settings.app_user.roles.clear();

        assert!(matches!(
            resolve_app_user(&settings),
            Err(CredentialError::NoRoles(_))
        ));
    }

    #[tokio::test]
    async fn create_step_fails_for_existing_user() {
        let user = resolve_app_user(&Settings::default()).unwrap();
        let store = MemoryStore::new("delivery_db").with_user(user.clone());

        let err = CreateAppUser { user }.run(&store).await.unwrap_err();
        assert_eq!(err.to_string(), "user 'stud' already exists");
    }
}
