//! Identity and role provisioning.

use kubeplane_cloud::{CreateRoleInput, IdentityApi, Role, Session};
use kubeplane_core::tags::NAME_KEY;
use kubeplane_core::Ownership;
use tracing::{debug, info};

use crate::error::Result;

/// Find a role by its well-known name, creating it if it doesn't exist.
///
/// Returns the role and whether this call created it. An existing role is
/// returned unchanged. Only a not-found lookup leads to creation; any other
/// lookup error propagates.
///
/// # Errors
///
/// Returns an error if the lookup fails for a reason other than not-found,
/// or if creation fails.
pub async fn ensure_role<A: IdentityApi + ?Sized>(
    api: &A,
    session: &Session,
    ownership: &Ownership,
    name: &str,
    description: &str,
    trust_policy: serde_json::Value,
) -> Result<(Role, bool)> {
    match api.get_role(session, name).await {
        Ok(role) => {
            debug!(role = name, "Found existing role");
            return Ok((role, false));
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let mut tags = ownership.tags();
    tags.insert(NAME_KEY.to_string(), name.to_string());

    let input = CreateRoleInput {
        name: name.to_string(),
        description: description.to_string(),
        trust_policy,
        tags,
    };
    let role = api.create_role(session, &input).await?;
    info!(role = name, role_id = %role.id, "Created role");
    Ok((role, true))
}

/// Attach policies to a role. Attaching an already attached policy is a no-op
/// on every provider.
///
/// # Errors
///
/// Returns the first attachment error.
pub async fn attach_policies<A: IdentityApi + ?Sized>(
    api: &A,
    session: &Session,
    role: &str,
    policies: &[&str],
) -> Result<()> {
    for policy in policies {
        api.attach_role_policy(session, role, policy).await?;
        info!(role, policy, "Attached role policy");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeplane_cloud::{CloudError, MockCloud};
    use kubeplane_core::Provider;

    fn session() -> Session {
        Session::new(
            Provider::Aws,
            "us-east-1",
            "123456789012",
            "AKIA",
            "secret",
            chrono::Duration::minutes(15),
        )
    }

    #[tokio::test]
    async fn creates_once_then_reuses() {
        let cloud = MockCloud::new(Provider::Aws);
        let ownership = Ownership::new("kubeplane", "test");

        let (role, created) = ensure_role(
            &cloud,
            &session(),
            &ownership,
            "kubeplane-node-role",
            "node role",
            serde_json::json!({}),
        )
        .await
        .unwrap();
        assert!(created);
        assert!(ownership.matches(&role.tags));

        let (again, created) = ensure_role(
            &cloud,
            &session(),
            &ownership,
            "kubeplane-node-role",
            "node role",
            serde_json::json!({}),
        )
        .await
        .unwrap();
        assert!(!created);
        assert_eq!(again.id, role.id);
        assert_eq!(cloud.calls("create_role"), 1);
    }

    #[tokio::test]
    async fn lookup_errors_other_than_not_found_propagate() {
        let cloud = MockCloud::new(Provider::Aws);
        cloud.fail_on(
            "get_role",
            CloudError::Api {
                code: "AccessDenied".into(),
                message: "denied".into(),
            },
        );

        let result = ensure_role(
            &cloud,
            &session(),
            &Ownership::new("kubeplane", "test"),
            "kubeplane-node-role",
            "node role",
            serde_json::json!({}),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(cloud.calls("create_role"), 0);
    }

    #[tokio::test]
    async fn attaches_each_policy() {
        let cloud = MockCloud::new(Provider::Aws);
        let ownership = Ownership::new("kubeplane", "test");
        ensure_role(
            &cloud,
            &session(),
            &ownership,
            "r",
            "d",
            serde_json::json!({}),
        )
        .await
        .unwrap();

        attach_policies(&cloud, &session(), "r", &["p1", "p2"])
            .await
            .unwrap();

        assert_eq!(cloud.role("r").unwrap().attached_policies, vec!["p1", "p2"]);
    }
}
