//! Auth domain types — Role, ProfileStatus, Profile, Session, SubscriptionRecord
//!
//! Serializable, cloneable, and cheap to pass around.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Marketplace roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tenant,
    Landlord,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Landlord => "landlord",
            Self::Admin => "admin",
        }
    }

    /// Parse a role name, `None` for anything unknown
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tenant" => Some(Self::Tenant),
            "landlord" => Some(Self::Landlord),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Tenants wait for manual/payment approval before becoming active
    pub fn requires_approval(&self) -> bool {
        matches!(self, Self::Tenant)
    }

    /// Status a freshly created profile with this role starts in
    pub fn default_status(&self) -> ProfileStatus {
        if self.requires_approval() {
            ProfileStatus::Pending
        } else {
            ProfileStatus::Active
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile lifecycle flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Pending,
    Active,
    Blocked,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile — the application's durable record for one backend user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub role: Role,
    pub status: ProfileStatus,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_active(&self) -> bool {
        self.status == ProfileStatus::Active
    }

    pub fn requires_approval(&self) -> bool {
        self.status == ProfileStatus::Pending
    }

    /// Merge the fields present in `update` into this record
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }
}

/// Fields of a profile row to insert; the store stamps `created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub role: Role,
    pub status: ProfileStatus,
}

impl NewProfile {
    /// Build a row whose status follows from `role`
    pub fn for_role(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        phone: Option<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            phone,
            name: name.into(),
            role,
            status: role.default_status(),
        }
    }

    pub fn into_profile(self, created_at: DateTime<Utc>) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            phone: self.phone,
            name: self.name,
            role: self.role,
            status: self.status,
            created_at,
        }
    }
}

/// Partial profile fields for `update_profile`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProfileStatus>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn status(mut self, status: ProfileStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone.is_none()
            && self.name.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }
}

/// Signup metadata attached to the registration call
///
/// Stored by the auth backend as free-form JSON, so every field is optional
/// and the role stays a raw string until it is resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl SignUpMetadata {
    /// Blank name or phone are stored as absent
    pub fn new(name: &str, phone: &str, role: Role) -> Self {
        Self {
            name: non_blank(name),
            phone: non_blank(phone),
            role: Some(role.as_str().to_string()),
        }
    }

    /// Declared role, if present and recognised
    pub fn declared_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }

    /// Metadata name, else the local part of `email`, else `placeholder`
    pub fn display_name(&self, email: &str, placeholder: &str) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match email.split('@').next().map(str::trim) {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => placeholder.to_string(),
        }
    }

    pub fn to_json(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Session — backend-issued proof of authentication for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl Session {
    /// Signup metadata; malformed metadata reads as empty
    pub fn metadata(&self) -> SignUpMetadata {
        serde_json::from_value(Value::Object(self.user_metadata.clone())).unwrap_or_default()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Kind of session change reported by the auth backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One session-change notification: what happened and the resulting session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Result of a registration call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignUpOutcome {
    /// Backend user id, absent if the backend withheld it
    pub user_id: Option<String>,
    /// Absent while email confirmation is pending
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant subscription row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub user_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
}

impl SubscriptionRecord {
    pub fn new(
        user_id: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            start_date,
            end_date,
            status,
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `start` plus `months` calendar months, clamped to the end of shorter months
pub fn add_months(start: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_role_default_status() {
        assert_eq!(Role::Tenant.default_status(), ProfileStatus::Pending);
        assert_eq!(Role::Landlord.default_status(), ProfileStatus::Active);
        assert_eq!(Role::Admin.default_status(), ProfileStatus::Active);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("tenant"), Some(Role::Tenant));
        assert_eq!(Role::parse(" Landlord "), Some(Role::Landlord));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Tenant).unwrap();
        assert_eq!(json, "\"tenant\"");
        let parsed: ProfileStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(parsed, ProfileStatus::Blocked);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let named = SignUpMetadata { name: Some("Amina".into()), ..Default::default() };
        assert_eq!(named.display_name("a@b.cm", "Utilisateur"), "Amina");

        let blank = SignUpMetadata { name: Some("  ".into()), ..Default::default() };
        assert_eq!(blank.display_name("paul.m@mail.cm", "Utilisateur"), "paul.m");

        let empty = SignUpMetadata::default();
        assert_eq!(empty.display_name("", "Utilisateur"), "Utilisateur");
        assert_eq!(empty.display_name("@mail.cm", "Utilisateur"), "Utilisateur");
    }

    #[test]
    fn test_session_metadata_parsing() {
        let meta = SignUpMetadata::new("Amina", "690000000", Role::Tenant);
        let session = Session {
            user_id: "u1".into(),
            email: "amina@mail.cm".into(),
            access_token: "t".into(),
            expires_at: Utc::now(),
            user_metadata: meta.to_json(),
        };
        assert_eq!(session.metadata(), meta);
        assert_eq!(session.metadata().declared_role(), Some(Role::Tenant));

        let mut garbage = Map::new();
        garbage.insert("role".into(), Value::from(42));
        let odd = Session { user_metadata: garbage, ..session };
        assert_eq!(odd.metadata(), SignUpMetadata::default());
    }

    #[test]
    fn test_profile_apply_partial_update() {
        let mut profile = NewProfile::for_role("u1", "y@mail.cm", "Y", None, Role::Landlord)
            .into_profile(Utc::now());
        profile.apply(&ProfileUpdate::new().name("X").phone("677000000"));
        assert_eq!(profile.name, "X");
        assert_eq!(profile.phone.as_deref(), Some("677000000"));
        assert_eq!(profile.email, "y@mail.cm");
        assert_eq!(profile.role, Role::Landlord);
        assert!(profile.is_active());
    }

    #[test]
    fn test_add_months_clamps() {
        let jan31 = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();
        let end = add_months(jan31, 1);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap());

        let mid = Utc.with_ymd_and_hms(2026, 3, 15, 8, 30, 0).unwrap();
        assert_eq!(add_months(mid, 1), Utc.with_ymd_and_hms(2026, 4, 15, 8, 30, 0).unwrap());
    }
}
