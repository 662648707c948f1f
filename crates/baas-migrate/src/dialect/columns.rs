//! Record property to SQL column mapping.
//!
//! Rows read through the REST surface carry whatever property names the
//! application wrote, which over time has included both camelCase and
//! snake_case spellings of the same column. The static table below resolves
//! each spelling to the column that actually exists in the schema.

use tracing::warn;

use crate::core::identifier::quote_if_needed;
use crate::error::Result;

/// `(table, record property, target column)`.
pub const COLUMN_MAPPINGS: &[(&str, &str, &str)] = &[
    // profiles
    ("profiles", "fullName", "full_name"),
    ("profiles", "avatarUrl", "avatar_url"),
    ("profiles", "createdAt", "created_at"),
    ("profiles", "updatedAt", "updated_at"),
    // brokers
    ("brokers", "profileId", "profile_id"),
    ("brokers", "creciNumber", "creci"),
    ("brokers", "photoUrl", "photo_url"),
    ("brokers", "isActive", "is_active"),
    ("brokers", "createdAt", "created_at"),
    // property_type_translations
    ("property_type_translations", "propertyType", "property_type"),
    // resources
    ("resources", "fileUrl", "file_url"),
    ("resources", "createdBy", "created_by"),
    ("resources", "createdAt", "created_at"),
    // properties
    ("properties", "viewCount", "viewCount"),
    ("properties", "view_count", "viewCount"),
    ("properties", "views", "viewCount"),
    ("properties", "isFeatured", "isFeatured"),
    ("properties", "is_featured", "isFeatured"),
    ("properties", "featured", "isFeatured"),
    ("properties", "propertyType", "property_type"),
    ("properties", "transactionType", "transaction_type"),
    ("properties", "zipCode", "zip_code"),
    ("properties", "parkingSpaces", "parking_spaces"),
    ("properties", "categoryId", "category_id"),
    ("properties", "brokerId", "broker_id"),
    ("properties", "ownerId", "owner_id"),
    ("properties", "createdAt", "created_at"),
    ("properties", "updatedAt", "updated_at"),
    // applications
    ("applications", "propertyId", "property_id"),
    ("applications", "applicantId", "applicant_id"),
    ("applications", "fullName", "full_name"),
    ("applications", "createdAt", "created_at"),
    ("applications", "updatedAt", "updated_at"),
    // tenants
    ("tenants", "propertyId", "property_id"),
    ("tenants", "profileId", "profile_id"),
    ("tenants", "applicationId", "application_id"),
    ("tenants", "fullName", "full_name"),
    ("tenants", "leaseStart", "lease_start"),
    ("tenants", "leaseEnd", "lease_end"),
    ("tenants", "monthlyRent", "monthly_rent"),
    ("tenants", "createdAt", "created_at"),
    // conversations
    ("conversations", "propertyId", "property_id"),
    ("conversations", "userId", "user_id"),
    ("conversations", "brokerId", "broker_id"),
    ("conversations", "lastMessageAt", "last_message_at"),
    ("conversations", "createdAt", "created_at"),
    // messages
    ("messages", "conversationId", "conversation_id"),
    ("messages", "senderId", "sender_id"),
    ("messages", "readAt", "read_at"),
    ("messages", "createdAt", "created_at"),
    // ai_configs
    ("ai_configs", "apiKey", "api_key"),
    ("ai_configs", "isActive", "is_active"),
    ("ai_configs", "createdAt", "created_at"),
    // storage_configs
    ("storage_configs", "accessKey", "access_key"),
    ("storage_configs", "secretKey", "secret_key"),
    ("storage_configs", "isDefault", "is_default"),
    ("storage_configs", "createdAt", "created_at"),
];

/// Target column for a property, or the property itself when unmapped.
pub fn target_column<'a>(table: &str, property: &'a str) -> &'a str {
    COLUMN_MAPPINGS
        .iter()
        .find(|(t, p, _)| *t == table && *p == property)
        .map(|(_, _, column)| *column)
        .unwrap_or(property)
}

/// A record property paired with the column it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    /// Key in the exported record.
    pub property: String,
    /// Unquoted target column name.
    pub column: String,
    /// Column as it appears in SQL (quoted when mixed-case).
    pub sql: String,
}

impl MappedColumn {
    pub fn is_id(&self) -> bool {
        self.column == "id"
    }
}

/// Map record properties to target columns, in input order.
///
/// When several properties land on the same column only the first one is
/// kept; the rest are dropped with a warning so a statement never names a
/// column twice.
pub fn map_column_names(table: &str, properties: &[String]) -> Result<Vec<MappedColumn>> {
    let mut mapped: Vec<MappedColumn> = Vec::with_capacity(properties.len());

    for property in properties {
        let column = target_column(table, property);
        if let Some(existing) = mapped.iter().find(|m| m.column == column) {
            warn!(
                "{}: property '{}' maps to column '{}' already supplied by '{}', dropping it",
                table, property, column, existing.property
            );
            continue;
        }
        mapped.push(MappedColumn {
            property: property.clone(),
            column: column.to_string(),
            sql: quote_if_needed(column)?,
        });
    }

    Ok(mapped)
}
