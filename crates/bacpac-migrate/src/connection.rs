//! Connection strings for SqlPackage and the destination probe.
//!
//! Authentication is never carried as credentials: cloud endpoints use
//! interactive directory sign-in and on-premises endpoints use integrated
//! security, both resolved by the client at connect time.

use std::borrow::Cow;

use crate::config::PlatformKind;

/// Port cloud SQL endpoints listen on.
pub const CLOUD_SQL_PORT: u16 = 1433;

/// Database used when probing or dropping the destination.
pub const MASTER_DATABASE: &str = "master";

/// Build an ADO.NET-style connection string for a database endpoint.
pub fn connection_string(kind: PlatformKind, server: &str, database: &str) -> String {
    match kind {
        PlatformKind::Cloud => format!(
            "Server=tcp:{},{};Initial Catalog={};Authentication=Active Directory Interactive;\
             Encrypt=True;TrustServerCertificate=False;",
            quote_value(cloud_host(server)),
            CLOUD_SQL_PORT,
            quote_value(database)
        ),
        PlatformKind::OnPrem => format!(
            "Server={};Initial Catalog={};Integrated Security=True;TrustServerCertificate=True;",
            quote_value(server),
            quote_value(database)
        ),
    }
}

/// Quote a value so it cannot end its key or start another one.
///
/// Values containing a separator, a quote or surrounding whitespace are
/// wrapped in double quotes with embedded double quotes doubled, or in
/// single quotes when only double quotes appear.
fn quote_value(value: &str) -> Cow<'_, str> {
    let needs_quoting = value.contains(|c: char| matches!(c, ';' | '=' | '"' | '\''))
        || value.trim() != value;
    if !needs_quoting {
        return Cow::Borrowed(value);
    }

    if value.contains('"') && !value.contains('\'') {
        Cow::Owned(format!("'{}'", value))
    } else {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    }
}

/// Strip any protocol prefix or port a user already put on a cloud server name.
fn cloud_host(server: &str) -> &str {
    let host = server.strip_prefix("tcp:").unwrap_or(server);
    host.split(',').next().unwrap_or(host)
}
