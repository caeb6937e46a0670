//! Invitation business logic - issuing, listing, cancelling and redeeming invitations.
//!
//! Admins may invite managers and agents; managers may invite agents only and
//! see only the invitations they issued. An invitation is single-use: once
//! `used` it can be neither redeemed again nor cancelled.

use crate::{
    core::{
        access::Actor,
        auth::{ensure_email_free, is_valid_email, normalize_email},
        pagination::{Page, PageRequest, fetch_page},
    },
    entities::{Invitation, Role, invitation},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Body of `POST /api/invitations`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvitationInput {
    pub email: String,
    pub role: Role,
}

/// List filters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InvitationFilter {
    pub role: Option<Role>,
    pub used: Option<bool>,
    /// Email substring
    pub search: Option<String>,
}

/// Roles `actor` may hand out.
fn may_invite(actor: &Actor, role: Role) -> bool {
    match actor.role {
        Role::Admin => matches!(role, Role::Manager | Role::Agent),
        Role::Manager => role == Role::Agent,
        Role::Agent => false,
    }
}

/// Issues a new invitation.
///
/// # Errors
/// - `Forbidden` when the caller may not invite `role`
/// - `Validation` for a malformed email
/// - `Conflict` when the email is registered or already has a pending invitation
pub async fn create_invitation(
    db: &DatabaseConnection,
    actor: &Actor,
    email: &str,
    role: Role,
) -> Result<invitation::Model> {
    if !may_invite(actor, role) {
        return Err(Error::forbidden(format!(
            "a {} cannot invite a {role}",
            actor.role
        )));
    }

    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(Error::field("email", "is not a valid email"));
    }
    ensure_email_free(db, &email).await?;

    let pending = Invitation::find()
        .filter(invitation::Column::Email.eq(email.as_str()))
        .filter(invitation::Column::Used.eq(false))
        .count(db)
        .await?;
    if pending > 0 {
        return Err(Error::Conflict {
            field: Some("email"),
            message: format!("{email} already has a pending invitation"),
        });
    }

    let created = invitation::ActiveModel {
        email: Set(email),
        role: Set(role),
        token: Set(Uuid::new_v4().simple().to_string()),
        used: Set(false),
        invited_by: Set(actor.id),
        created_at: Set(Utc::now()),
        used_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "User {} invited {} as {} (invitation {})",
        actor.id, created.email, created.role, created.id
    );
    Ok(created)
}

/// Lists invitations visible to the caller, newest first.
pub async fn list_invitations(
    db: &DatabaseConnection,
    actor: &Actor,
    filter: &InvitationFilter,
    page: PageRequest,
) -> Result<Page<invitation::Model>> {
    actor.require(&[Role::Admin, Role::Manager])?;

    let mut select = Invitation::find();
    if !actor.is_admin() {
        select = select.filter(invitation::Column::InvitedBy.eq(actor.id));
    }
    if let Some(role) = filter.role {
        select = select.filter(invitation::Column::Role.eq(role));
    }
    if let Some(used) = filter.used {
        select = select.filter(invitation::Column::Used.eq(used));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(invitation::Column::Email.contains(search.to_lowercase()));
    }

    fetch_page(
        db,
        select
            .order_by_desc(invitation::Column::CreatedAt)
            .order_by_desc(invitation::Column::Id),
        page,
    )
    .await
}

/// Cancels (deletes) an unused invitation.
///
/// # Errors
/// `NotFound` when missing or not the caller's, `Conflict` when already used.
pub async fn cancel_invitation(db: &DatabaseConnection, actor: &Actor, id: i64) -> Result<()> {
    actor.require(&[Role::Admin, Role::Manager])?;

    let found = Invitation::find_by_id(id)
        .one(db)
        .await?
        .filter(|inv| actor.is_admin() || inv.invited_by == actor.id)
        .ok_or_else(|| Error::not_found("invitation", id))?;

    if found.used {
        return Err(Error::Conflict {
            field: None,
            message: "a used invitation cannot be cancelled".to_string(),
        });
    }

    found.delete(db).await?;
    info!("User {} cancelled invitation {id}", actor.id);
    Ok(())
}

/// Looks up an invitation that can still be redeemed.
///
/// # Errors
/// `NotFound` for an unknown token, `Conflict` when it has been used.
pub async fn find_usable<C>(db: &C, token: &str) -> Result<invitation::Model>
where
    C: ConnectionTrait,
{
    let token = token.trim();
    let found = Invitation::find()
        .filter(invitation::Column::Token.eq(token))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invitation", token))?;

    if found.used {
        return Err(Error::Conflict {
            field: Some("token"),
            message: "this invitation has already been used".to_string(),
        });
    }
    Ok(found)
}

/// Number of unused invitations issued by `issuer`, or by anyone when `None`.
pub async fn count_pending(db: &DatabaseConnection, issuer: Option<i64>) -> Result<u64> {
    let mut select = Invitation::find().filter(invitation::Column::Used.eq(false));
    if let Some(issuer) = issuer {
        select = select.filter(invitation::Column::InvitedBy.eq(issuer));
    }
    select.count(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_role_rules_and_email_format() -> Result<()> {
        let db = setup_test_db().await?;
        let manager = Actor {
            id: 1,
            role: Role::Manager,
        };
        let agent = Actor {
            id: 2,
            role: Role::Agent,
        };

        let result = create_invitation(&db, &manager, "x@agency.test", Role::Manager).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        let result = create_invitation(&db, &agent, "x@agency.test", Role::Agent).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        let result = create_invitation(&db, &manager, "not-an-email", Role::Agent).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let admin = Actor {
            id: 3,
            role: Role::Admin,
        };
        let result = create_invitation(&db, &admin, "x@agency.test", Role::Admin).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invitation_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_user(&db, "root@agency.test", Role::Admin, None).await?;

        let invite =
            create_invitation(&db, &Actor::from(&admin), " New@Agency.test ", Role::Manager)
                .await?;
        assert_eq!(invite.email, "new@agency.test");
        assert_eq!(invite.role, Role::Manager);
        assert!(!invite.used);
        assert_eq!(invite.token.len(), 32);
        assert_eq!(invite.invited_by, admin.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        create_invitation(&db, &admin, "dup@agency.test", Role::Agent).await?;

        let again = create_invitation(&db, &admin, "dup@agency.test", Role::Agent).await;
        assert!(matches!(again, Err(Error::Conflict { .. })));

        let registered = create_invitation(&db, &admin, "root@agency.test", Role::Agent).await;
        assert!(matches!(
            registered,
            Err(Error::Conflict {
                field: Some("email"),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_scopes_and_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let manager =
            Actor::from(&create_test_user(&db, "boss@agency.test", Role::Manager, None).await?);

        create_invitation(&db, &admin, "m1@agency.test", Role::Manager).await?;
        create_invitation(&db, &admin, "a1@agency.test", Role::Agent).await?;
        create_invitation(&db, &manager, "a2@agency.test", Role::Agent).await?;

        let all = list_invitations(
            &db,
            &admin,
            &InvitationFilter::default(),
            PageRequest::default(),
        )
        .await?;
        assert_eq!(all.meta.total, 3);
        // Newest first
        assert_eq!(all.items[0].email, "a2@agency.test");

        let own =
            list_invitations(&db, &manager, &InvitationFilter::default(), PageRequest::default())
                .await?;
        assert_eq!(own.meta.total, 1);
        assert_eq!(own.items[0].email, "a2@agency.test");

        let agents_only = list_invitations(
            &db,
            &admin,
            &InvitationFilter {
                role: Some(Role::Agent),
                ..InvitationFilter::default()
            },
            PageRequest::default(),
        )
        .await?;
        assert_eq!(agents_only.meta.total, 2);

        let searched = list_invitations(
            &db,
            &admin,
            &InvitationFilter {
                search: Some("M1@".to_string()),
                ..InvitationFilter::default()
            },
            PageRequest::default(),
        )
        .await?;
        assert_eq!(searched.meta.total, 1);

        let paged = list_invitations(
            &db,
            &admin,
            &InvitationFilter::default(),
            PageRequest { page: 2, limit: 2 },
        )
        .await?;
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.meta.total_pages, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_rules() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let manager =
            Actor::from(&create_test_user(&db, "boss@agency.test", Role::Manager, None).await?);

        let by_admin = create_invitation(&db, &admin, "a1@agency.test", Role::Agent).await?;
        let by_manager = create_invitation(&db, &manager, "a2@agency.test", Role::Agent).await?;

        // Managers cannot see, hence cannot cancel, other issuers' invitations
        let result = cancel_invitation(&db, &manager, by_admin.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        cancel_invitation(&db, &manager, by_manager.id).await?;
        assert!(Invitation::find_by_id(by_manager.id).one(&db).await?.is_none());

        // Cancelled invitations cannot be redeemed
        let result = find_usable(&db, &by_manager.token).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_used_invitation_is_terminal() -> Result<()> {
        let db = setup_test_db().await?;
        let admin =
            Actor::from(&create_test_user(&db, "root@agency.test", Role::Admin, None).await?);
        let invite = create_invitation(&db, &admin, "a1@agency.test", Role::Agent).await?;
        mark_used(&db, invite.id).await?;

        assert!(matches!(
            cancel_invitation(&db, &admin, invite.id).await,
            Err(Error::Conflict { .. })
        ));
        assert!(matches!(
            find_usable(&db, &invite.token).await,
            Err(Error::Conflict { .. })
        ));
        assert_eq!(count_pending(&db, None).await?, 0);
        Ok(())
    }

    async fn mark_used(db: &DatabaseConnection, id: i64) -> Result<()> {
        let found = Invitation::find_by_id(id).one(db).await?.unwrap();
        let mut active: invitation::ActiveModel = found.into();
        active.used = Set(true);
        active.update(db).await?;
        Ok(())
    }
}
