//! Role and status enums.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A user's role in the store.
///
/// Persisted as `"Customer"` / `"Admin"` in the `storefront.user` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    /// The stored and displayed name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Admin => "Admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("customer") => Ok(Self::Customer),
            s if s.eq_ignore_ascii_case("admin") => Ok(Self::Admin),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Lifecycle status of an order entity.
///
/// `Processed` is written by the external order processor as `PROCESSED`,
/// so that spelling is kept on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Submitted,
    Processing,
    #[serde(rename = "PROCESSED", alias = "Processed")]
    Processed,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Statuses an admin can pick from when editing an order.
    pub const EDITABLE: [Self; 5] = [
        Self::Submitted,
        Self::Processing,
        Self::Processed,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Processing => "Processing",
            Self::Processed => "PROCESSED",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }

    /// Orders that still need attention from the shop.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Submitted | Self::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Submitted" => Self::Submitted,
            "Processing" => Self::Processing,
            "PROCESSED" | "Processed" => Self::Processed,
            "Completed" => Self::Completed,
            "Cancelled" => Self::Cancelled,
            _ => Self::Unknown,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "Admin");
        assert_eq!(Role::default(), Role::Customer);
    }

    #[test]
    fn test_processed_uses_upper_case_on_the_wire() {
        let json = serde_json::to_string(&OrderStatus::Processed).unwrap();
        assert_eq!(json, "\"PROCESSED\"");
        let parsed: OrderStatus = serde_json::from_str("\"Processed\"").unwrap();
        assert_eq!(parsed, OrderStatus::Processed);
    }

    #[test]
    fn test_unrecognised_status_reads_as_unknown() {
        let parsed: OrderStatus = serde_json::from_str("\"Shipped\"").unwrap();
        assert_eq!(parsed, OrderStatus::Unknown);
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Unknown);
    }

    #[test]
    fn test_pending_statuses() {
        assert!(OrderStatus::Submitted.is_pending());
        assert!(OrderStatus::Processing.is_pending());
        assert!(!OrderStatus::Processed.is_pending());
        assert!(!OrderStatus::Cancelled.is_pending());
    }
}
