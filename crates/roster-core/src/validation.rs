//! Pure checks over client fields and point sets.
//!
//! Local checks look at a single client and run on every edit. The one global
//! check, [`check_global_uniqueness`], reads the committed registry and is
//! only meaningful at commit time.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use roster_types::{App, Client, Point};

use crate::error::{Field, ValidationError};
use crate::repository::PointRegistry;

pub type Validation<T = ()> = Result<T, ValidationError>;

pub fn validate_name(name: &str) -> Validation {
    if name.trim().is_empty() {
        return Err(ValidationError::empty(Field::Name));
    }
    Ok(())
}

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Returns the digits-only phone.
pub fn validate_phone_raw(raw: &str) -> Validation<String> {
    let digits = normalize_phone(raw);
    if digits.is_empty() {
        return Err(ValidationError::empty(Field::Phone));
    }
    Ok(digits)
}

/// Email is optional; when present it must look like `local@domain.tld`.
pub fn validate_email(email: Option<&str>) -> Validation {
    match email {
        None | Some("") => Ok(()),
        Some(email) if is_simple_email(email) => Ok(()),
        Some(_) => Err(ValidationError::InvalidFormat {
            field: Field::Email,
        }),
    }
}

fn is_simple_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Returns the floored screen count.
pub fn validate_screens(n: f64) -> Validation<u32> {
    if !n.is_finite() || n < 1.0 {
        return Err(ValidationError::OutOfRange {
            field: Field::Screens,
            constraint: "must be at least 1",
        });
    }
    if n >= f64::from(u32::MAX) + 1.0 {
        return Err(ValidationError::OutOfRange {
            field: Field::Screens,
            constraint: "is too large",
        });
    }
    Ok(n.floor() as u32)
}

/// The due date must fall on a later calendar day than `today`.
pub fn validate_due_date(due: Option<NaiveDate>, today: NaiveDate) -> Validation<NaiveDate> {
    let due = due.ok_or(ValidationError::empty(Field::DueDate))?;
    if due <= today {
        return Err(ValidationError::OutOfRange {
            field: Field::DueDate,
            constraint: "must be later than today",
        });
    }
    Ok(due)
}

/// Checks one point against its app and the points already bound to the same
/// server (excluding the point itself when it is being edited).
///
/// Exclusive apps only ever consume one connection and skip the partial quota
/// sum; the exact per-server total is enforced by the save gate.
pub fn validate_point_local(
    point: &Point,
    app: Option<&App>,
    screens_per_server: u32,
    existing_for_server: &[Point],
) -> Validation {
    let server_id = point
        .server_id
        .as_deref()
        .ok_or(ValidationError::missing(Field::PointServer))?;
    point
        .app_id
        .as_deref()
        .ok_or(ValidationError::missing(Field::PointApp))?;
    let app = app.ok_or(ValidationError::missing(Field::PointApp))?;

    if point.user.trim().is_empty() {
        return Err(ValidationError::empty(Field::PointUser));
    }
    if point.pass.is_empty() {
        return Err(ValidationError::empty(Field::PointPass));
    }

    if app.is_exclusive() {
        if point.conns != 1 {
            return Err(ValidationError::ExclusivityViolation {
                app_id: app.id.clone(),
                conns: point.conns,
            });
        }
        return Ok(());
    }

    if point.conns < 1 {
        return Err(ValidationError::OutOfRange {
            field: Field::PointConns,
            constraint: "must be at least 1",
        });
    }
    let requested = existing_for_server
        .iter()
        .fold(point.conns, |total, p| total.saturating_add(p.conns));
    if requested > screens_per_server {
        return Err(ValidationError::QuotaExceeded {
            server_id: server_id.to_string(),
            requested,
            quota: screens_per_server,
        });
    }
    Ok(())
}

/// Connections per server. Unbound points and zero totals are left out.
/// Totals saturate at `u32::MAX`, which no quota can match.
pub fn sum_conns(points: &[Point]) -> BTreeMap<String, u32> {
    let mut sums = BTreeMap::new();
    for point in points {
        if let Some(server_id) = &point.server_id {
            let total: &mut u32 = sums.entry(server_id.clone()).or_insert(0);
            *total = total.saturating_add(point.conns);
        }
    }
    sums.retain(|_, total| *total > 0);
    sums
}

/// Runs [`validate_point_local`] over a whole point set, each point measured
/// against the other points on its server. Stops at the first failure.
pub fn check_points_local(points: &[Point], apps: &[App], screens_per_server: u32) -> Validation {
    for (idx, point) in points.iter().enumerate() {
        let app = point
            .app_id
            .as_deref()
            .and_then(|id| apps.iter().find(|a| a.id == id));
        let others: Vec<Point> = points
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != idx && p.server_id.is_some() && p.server_id == point.server_id)
            .map(|(_, p)| p.clone())
            .collect();
        validate_point_local(point, app, screens_per_server, &others)?;
    }
    Ok(())
}

/// No two points of one client may share (app, user), whatever their servers.
pub fn check_local_unique_app_user(points: &[Point]) -> Validation {
    let mut seen = HashSet::new();
    for point in points {
        let Some(app_id) = point.app_id.as_deref() else {
            continue;
        };
        if point.user.is_empty() {
            continue;
        }
        if !seen.insert((app_id, point.user.as_str())) {
            return Err(ValidationError::DuplicateKey {
                app_id: app_id.to_string(),
                user: point.user.clone(),
            });
        }
    }
    Ok(())
}

/// True when any committed point, of any client, holds (app, user).
pub fn check_global_uniqueness<R: PointRegistry + ?Sized>(
    registry: &R,
    app_id: &str,
    user: &str,
) -> anyhow::Result<bool> {
    Ok(registry.find_by_app_and_user(app_id, user)?.is_some())
}

/// Every identity field, evaluated independently so all failures surface at
/// once. Order matches the form top to bottom.
pub fn validate_client_fields(client: &Client, today: NaiveDate) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Err(e) = validate_name(&client.name) {
        errors.push(e);
    }
    if let Err(e) = validate_phone_raw(&client.phone) {
        errors.push(e);
    }
    if let Err(e) = validate_email(client.email.as_deref()) {
        errors.push(e);
    }
    if let Err(e) = validate_screens(f64::from(client.screens_per_server)) {
        errors.push(e);
    }
    if let Err(e) = validate_due_date(client.due_date, today) {
        errors.push(e);
    }
    if client.plan_id.is_none() {
        errors.push(ValidationError::empty(Field::Plan));
    }
    if client.server1_id.is_none() {
        errors.push(ValidationError::empty(Field::Server1));
    }
    errors
}

pub fn check_servers_distinct(client: &Client) -> Validation {
    match (&client.server1_id, &client.server2_id) {
        (Some(first), Some(second)) if first == second => Err(ValidationError::ServersNotDistinct {
            server_id: first.clone(),
        }),
        _ => Ok(()),
    }
}

/// Every point sits on an assigned server and every assigned server is
/// filled to exactly `screens_per_server`.
pub fn check_quota_exact(client: &Client) -> Validation {
    let sums = sum_conns(&client.points);
    if let Some(stray) = sums.keys().find(|s| !client.is_assigned(s)) {
        return Err(ValidationError::UnassignedServer {
            server_id: stray.clone(),
        });
    }

    let quota = client.screens_per_server;
    for server_id in client.assigned_servers() {
        let used = sums.get(server_id).copied().unwrap_or(0);
        if used > quota {
            return Err(ValidationError::QuotaExceeded {
                server_id: server_id.to_string(),
                requested: used,
                quota,
            });
        }
        if used < quota {
            return Err(ValidationError::QuotaNotFilled {
                server_id: server_id.to_string(),
                used,
                quota,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn shared() -> App {
        App {
            id: "app1".into(),
            name: "Shared".into(),
            multi_access: true,
        }
    }

    fn exclusive() -> App {
        App {
            id: "app2".into(),
            name: "Exclusive".into(),
            multi_access: false,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn name_must_not_be_blank() {
        assert!(validate_name("Ana").is_ok());
        assert_eq!(validate_name("   ").unwrap_err().kind(), ErrorKind::EmptyField);
        assert_eq!(validate_name("").unwrap_err().kind(), ErrorKind::EmptyField);
    }

    #[test]
    fn phone_is_normalized_to_digits() {
        assert_eq!(validate_phone_raw("(11) 98765-4321").unwrap(), "11987654321");
        assert_eq!(validate_phone_raw("abc").unwrap_err().kind(), ErrorKind::EmptyField);
    }

    #[test]
    fn email_is_optional_but_checked_when_present() {
        assert!(validate_email(None).is_ok());
        assert!(validate_email(Some("")).is_ok());
        assert!(validate_email(Some("ana@example.com")).is_ok());
        for bad in ["ana", "ana@example", "a na@example.com", "@example.com", "ana@.com", "a@b@c.com"] {
            assert_eq!(
                validate_email(Some(bad)).unwrap_err().kind(),
                ErrorKind::InvalidFormat,
                "{bad}"
            );
        }
    }

    #[test]
    fn screens_are_floored_and_bounded() {
        assert_eq!(validate_screens(2.7).unwrap(), 2);
        assert_eq!(validate_screens(1.0).unwrap(), 1);
        assert_eq!(validate_screens(0.9).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(validate_screens(f64::NAN).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(validate_screens(f64::INFINITY).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(validate_screens(f64::from(u32::MAX)).unwrap(), u32::MAX);
        assert_eq!(validate_screens(1e12).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn due_date_must_be_after_today() {
        let today = day(2024, 1, 15);
        assert_eq!(validate_due_date(None, today).unwrap_err().kind(), ErrorKind::EmptyField);
        assert_eq!(
            validate_due_date(Some(today), today).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert!(validate_due_date(Some(day(2024, 1, 16)), today).is_ok());
    }

    #[test]
    fn point_needs_references_before_anything_else() {
        let mut point = Point::new("s1", "app1", 1, "", "");
        point.server_id = None;
        let err = validate_point_local(&point, Some(&shared()), 3, &[]).unwrap_err();
        assert_eq!(err, ValidationError::missing(Field::PointServer));

        let point = Point::new("s1", "ghost", 1, "ana", "pw");
        let err = validate_point_local(&point, None, 3, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingReference);

        let point = Point::new("s1", "app1", 1, "ana", "");
        let err = validate_point_local(&point, Some(&shared()), 3, &[]).unwrap_err();
        assert_eq!(err, ValidationError::empty(Field::PointPass));
    }

    #[test]
    fn exclusive_app_requires_single_connection_regardless_of_quota() {
        let point = Point::new("s1", "app2", 2, "bob", "pw");
        let err = validate_point_local(&point, Some(&exclusive()), 10, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExclusivityViolation);

        let point = Point::new("s1", "app2", 1, "bob", "pw");
        assert!(validate_point_local(&point, Some(&exclusive()), 10, &[]).is_ok());
    }

    #[test]
    fn shared_app_respects_partial_quota() {
        let existing = vec![Point::new("s1", "app1", 2, "a", "pw")];
        let fits = Point::new("s1", "app1", 1, "b", "pw");
        assert!(validate_point_local(&fits, Some(&shared()), 3, &existing).is_ok());

        let overflow = Point::new("s1", "app1", 2, "b", "pw");
        let err = validate_point_local(&overflow, Some(&shared()), 3, &existing).unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuotaExceeded {
                server_id: "s1".into(),
                requested: 4,
                quota: 3,
            }
        );

        let zero = Point::new("s1", "app1", 0, "b", "pw");
        let err = validate_point_local(&zero, Some(&shared()), 3, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn sums_group_by_server_and_skip_unbound() {
        let mut unbound = Point::new("s9", "app1", 5, "c", "pw");
        unbound.server_id = None;
        let points = vec![
            Point::new("s1", "app1", 2, "a", "pw"),
            Point::new("s2", "app1", 1, "b", "pw"),
            Point::new("s1", "app2", 1, "d", "pw"),
            unbound,
        ];
        let sums = sum_conns(&points);
        assert_eq!(sums.len(), 2);
        assert_eq!(sums["s1"], 3);
        assert_eq!(sums["s2"], 1);
    }

    #[test]
    fn huge_connection_counts_saturate_instead_of_overflowing() {
        let points = vec![
            Point::new("s1", "app1", u32::MAX, "a", "pw"),
            Point::new("s1", "app1", 1, "b", "pw"),
        ];
        assert_eq!(sum_conns(&points)["s1"], u32::MAX);

        let err = validate_point_local(&points[1], Some(&shared()), 3, &points[..1]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuotaExceeded {
                server_id: "s1".into(),
                requested: u32::MAX,
                quota: 3,
            }
        );
    }

    #[test]
    fn point_set_is_checked_point_by_point() {
        let apps = [shared(), exclusive()];
        let points = vec![
            Point::new("s1", "app1", 1, "a", "pw"),
            Point::new("s1", "app2", 1, "b", "pw"),
            Point::new("s2", "app1", 2, "c", "pw"),
        ];
        assert!(check_points_local(&points, &apps, 2).is_ok());

        let doubled = vec![Point::new("s1", "app2", 2, "bob", "pw")];
        assert_eq!(
            check_points_local(&doubled, &apps, 2).unwrap_err().kind(),
            ErrorKind::ExclusivityViolation
        );

        let blank = vec![Point::new("s1", "app1", 1, "ana", "")];
        assert_eq!(
            check_points_local(&blank, &apps, 1).unwrap_err(),
            ValidationError::empty(Field::PointPass)
        );

        let unknown = vec![Point::new("s1", "ghost", 1, "ana", "pw")];
        assert_eq!(
            check_points_local(&unknown, &apps, 1).unwrap_err().kind(),
            ErrorKind::MissingReference
        );
    }

    #[test]
    fn local_uniqueness_ignores_servers() {
        let points = vec![
            Point::new("s1", "app1", 1, "ana", "pw"),
            Point::new("s2", "app1", 1, "ana", "other"),
        ];
        assert_eq!(
            check_local_unique_app_user(&points).unwrap_err().kind(),
            ErrorKind::DuplicateKey
        );

        let points = vec![
            Point::new("s1", "app1", 1, "ana", "pw"),
            Point::new("s1", "app2", 1, "ana", "pw"),
        ];
        assert!(check_local_unique_app_user(&points).is_ok());
    }

    #[test]
    fn global_uniqueness_sees_every_committed_client() {
        use crate::memory::MemoryStore;
        use crate::repository::ClientStore;

        let store = MemoryStore::new();
        assert!(!check_global_uniqueness(&store, "app2", "bob").unwrap());
        store
            .create(&Client {
                points: vec![Point::new("s1", "app2", 1, "bob", "pw")],
                ..Client::default()
            })
            .unwrap();
        assert!(check_global_uniqueness(&store, "app2", "bob").unwrap());
        assert!(!check_global_uniqueness(&store, "app2", "Bob").unwrap());
    }

    #[test]
    fn quota_must_be_filled_exactly_on_every_assigned_server() {
        let mut client = Client {
            screens_per_server: 3,
            server1_id: Some("s1".into()),
            points: vec![Point::new("s1", "app1", 2, "a", "pw")],
            ..Client::default()
        };
        assert_eq!(check_quota_exact(&client).unwrap_err().kind(), ErrorKind::OutOfRange);

        client.points.push(Point::new("s1", "app2", 1, "b", "pw"));
        assert!(check_quota_exact(&client).is_ok());

        client.server2_id = Some("s2".into());
        assert!(matches!(
            check_quota_exact(&client),
            Err(ValidationError::QuotaNotFilled { ref server_id, used: 0, .. }) if server_id == "s2"
        ));
    }

    #[test]
    fn points_on_unassigned_servers_block_the_quota_check() {
        let client = Client {
            screens_per_server: 1,
            server1_id: Some("s1".into()),
            points: vec![
                Point::new("s1", "app1", 1, "a", "pw"),
                Point::new("s2", "app1", 1, "b", "pw"),
            ],
            ..Client::default()
        };
        assert!(matches!(
            check_quota_exact(&client),
            Err(ValidationError::UnassignedServer { .. })
        ));
    }

    #[test]
    fn all_field_errors_are_reported_together() {
        let errors = validate_client_fields(&Client::default(), day(2024, 1, 15));
        let kinds: Vec<_> = errors.iter().map(ValidationError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::EmptyField, // name
                ErrorKind::EmptyField, // phone
                ErrorKind::EmptyField, // due date
                ErrorKind::EmptyField, // plan
                ErrorKind::EmptyField, // server 1
            ]
        );
    }
}
