//! Permission policies
//!
//! Each policy is a plain predicate over the HTTP method, the authenticated
//! actor (if any) and, for object-level checks, the object being touched.
//! An endpoint configures a list of policies; access is granted when any one
//! of them allows it. Before the list is consulted, every write must come from
//! an authenticated actor.

use axum::http::Method;

use crate::error::{ErrorMessage, HttpError};
use crate::models::{Comment, Review, User};

/// Something with an owning author (reviews, comments)
pub trait Authored {
    fn author_id(&self) -> i64;
}

impl Authored for Review {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

/// A policy predicate. `target` is `None` for collection-level checks.
pub type Policy = fn(&Method, Option<&User>, Option<&dyn Authored>) -> bool;

/// GET, HEAD and OPTIONS never modify anything
pub fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Reads are open; writes require an admin.
pub fn read_only_or_admin(
    method: &Method,
    actor: Option<&User>,
    _target: Option<&dyn Authored>,
) -> bool {
    is_safe(method) || actor.is_some_and(User::is_admin)
}

/// Reads are open, creating requires an account, changing or deleting an
/// existing object requires being its author, a moderator or an admin.
pub fn author_moderator_admin_or_read_only(
    method: &Method,
    actor: Option<&User>,
    target: Option<&dyn Authored>,
) -> bool {
    if is_safe(method) {
        return true;
    }
    let Some(actor) = actor else {
        return false;
    };
    match target {
        None => true,
        Some(_) if *method == Method::POST => true,
        Some(target) => {
            target.author_id() == actor.id || actor.is_moderator() || actor.is_admin()
        }
    }
}

/// Every operation, reads included, requires an admin or a staff account.
pub fn admin_or_staff_only(
    _method: &Method,
    actor: Option<&User>,
    _target: Option<&dyn Authored>,
) -> bool {
    actor.is_some_and(|user| user.is_admin() || user.is_staff)
}

/// Reads are open, writes require an account, and object-level writes are
/// reserved to the author.
pub fn authenticated_or_read_only_author(
    method: &Method,
    actor: Option<&User>,
    target: Option<&dyn Authored>,
) -> bool {
    if is_safe(method) {
        return true;
    }
    match (actor, target) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(actor), Some(target)) => target.author_id() == actor.id,
    }
}

/// Policies for the catalog (categories, genres, titles)
pub const CATALOG: &[Policy] = &[read_only_or_admin];

/// Policies for user administration
pub const USERS: &[Policy] = &[admin_or_staff_only];

/// Policies for reviews and comments
pub const USER_CONTENT: &[Policy] = &[author_moderator_admin_or_read_only];

/// Evaluate a policy list for one request.
///
/// An anonymous write is rejected with 401 before any policy runs; otherwise
/// a denial is a 403.
pub fn authorize(
    policies: &[Policy],
    method: &Method,
    actor: Option<&User>,
    target: Option<&dyn Authored>,
) -> Result<(), HttpError> {
    if !is_safe(method) && actor.is_none() {
        return Err(HttpError::unauthorized(
            ErrorMessage::UserNotAuthenticated.to_string(),
        ));
    }

    if policies
        .iter()
        .any(|policy| policy(method, actor, target))
    {
        Ok(())
    } else if actor.is_none() {
        Err(HttpError::unauthorized(
            ErrorMessage::UserNotAuthenticated.to_string(),
        ))
    } else {
        Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use axum::http::StatusCode;
    use chrono::Utc;

    fn user(id: i64, role: UserRole, is_staff: bool) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role,
            is_staff,
            confirmation_code: None,
            code_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Owned(i64);

    impl Authored for Owned {
        fn author_id(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn read_only_or_admin_gates_writes() {
        let admin = user(1, UserRole::Admin, false);
        let moderator = user(2, UserRole::Moderator, false);

        assert!(read_only_or_admin(&Method::GET, None, None));
        assert!(read_only_or_admin(&Method::POST, Some(&admin), None));
        assert!(!read_only_or_admin(&Method::POST, Some(&moderator), None));
        assert!(!read_only_or_admin(&Method::DELETE, None, None));
    }

    #[test]
    fn author_moderator_admin_for_object_writes() {
        let author = user(1, UserRole::User, false);
        let stranger = user(2, UserRole::User, false);
        let moderator = user(3, UserRole::Moderator, false);
        let admin = user(4, UserRole::Admin, false);
        let review = Owned(1);

        let check = |method: &Method, actor: Option<&User>| {
            author_moderator_admin_or_read_only(method, actor, Some(&review))
        };

        assert!(check(&Method::GET, None));
        assert!(check(&Method::PATCH, Some(&author)));
        assert!(check(&Method::DELETE, Some(&moderator)));
        assert!(check(&Method::DELETE, Some(&admin)));
        assert!(!check(&Method::PATCH, Some(&stranger)));
        assert!(!check(&Method::PATCH, None));

        // creation only needs an account
        assert!(author_moderator_admin_or_read_only(
            &Method::POST,
            Some(&stranger),
            None
        ));
    }

    #[test]
    fn admin_or_staff_covers_reads_too() {
        let staff = user(1, UserRole::User, true);
        let admin = user(2, UserRole::Admin, false);
        let moderator = user(3, UserRole::Moderator, false);

        assert!(admin_or_staff_only(&Method::GET, Some(&staff), None));
        assert!(admin_or_staff_only(&Method::DELETE, Some(&admin), None));
        assert!(!admin_or_staff_only(&Method::GET, Some(&moderator), None));
        assert!(!admin_or_staff_only(&Method::GET, None, None));
    }

    #[test]
    fn authenticated_or_read_only_author_ignores_roles() {
        let author = user(1, UserRole::User, false);
        let admin = user(2, UserRole::Admin, false);
        let comment = Owned(1);

        assert!(authenticated_or_read_only_author(&Method::GET, None, Some(&comment)));
        assert!(authenticated_or_read_only_author(&Method::POST, Some(&admin), None));
        assert!(authenticated_or_read_only_author(
            &Method::PATCH,
            Some(&author),
            Some(&comment)
        ));
        assert!(!authenticated_or_read_only_author(
            &Method::PATCH,
            Some(&admin),
            Some(&comment)
        ));
        assert!(!authenticated_or_read_only_author(&Method::POST, None, None));
    }

    #[test]
    fn authorize_distinguishes_401_from_403() {
        let reader = user(7, UserRole::User, false);

        let anonymous = authorize(CATALOG, &Method::DELETE, None, None).unwrap_err();
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

        let denied = authorize(CATALOG, &Method::DELETE, Some(&reader), None).unwrap_err();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);

        assert!(authorize(CATALOG, &Method::GET, None, None).is_ok());

        // admin_or_staff_only denies anonymous reads as well; still a 401
        let anonymous_read = authorize(USERS, &Method::GET, None, None).unwrap_err();
        assert_eq!(anonymous_read.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn authorize_is_an_or_across_policies() {
        let staff = user(1, UserRole::User, true);
        let policies: &[Policy] = &[read_only_or_admin, admin_or_staff_only];

        // read_only_or_admin denies a staff write, admin_or_staff_only grants it
        assert!(authorize(policies, &Method::POST, Some(&staff), None).is_ok());
        assert!(authorize(CATALOG, &Method::POST, Some(&staff), None).is_err());
    }
}
