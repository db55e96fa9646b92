//! Human-readable identifiers.
//!
//! Every sequence is derived from the highest suffix already stored, so the
//! lookup has to run on the same transaction that inserts the new row.

use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IdenStatic, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use crate::entities::{consignment, consignment_packaging, console};

pub const CONSIGNMENT_PREFIX: &str = "CSG";
pub const CONSOLE_PREFIX: &str = "CN";
pub const XML_PREFIX: &str = "XML";

const CONSIGNMENT_WIDTH: usize = 6;
const CONSOLE_WIDTH: usize = 6;
const XML_WIDTH: usize = 7;
const PACKAGE_WIDTH: usize = 3;

pub fn format_sequence(prefix: &str, width: usize, value: u64) -> String {
    format!("{}{:0width$}", prefix, value, width = width)
}

/// Numeric suffix of `id` when it carries `prefix`.
pub fn parse_sequence(prefix: &str, id: &str) -> Option<u64> {
    let suffix = id.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Identifier following `last`, or the first of the sequence when nothing exists yet.
pub fn next_after(prefix: &str, width: usize, last: Option<&str>) -> String {
    let next = last
        .and_then(|id| parse_sequence(prefix, id))
        .map(|n| n + 1)
        .unwrap_or(1);
    format_sequence(prefix, width, next)
}

pub fn package_prefix(consignment_code: &str) -> String {
    format!("{}-P", consignment_code)
}

/// Longest then lexically greatest value of `column`, which is the numeric
/// maximum for zero-padded identifiers that may outgrow their width.
async fn highest<C, E>(conn: &C, query: Select<E>, column: E::Column) -> Result<Option<String>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    query
        .select_only()
        .column(column)
        .order_by_desc(Expr::cust(format!("LENGTH({})", column.as_str())))
        .order_by_desc(column)
        .into_tuple::<String>()
        .one(conn)
        .await
}

pub async fn next_consignment_id<C: ConnectionTrait>(conn: &C) -> Result<String, DbErr> {
    let last = highest(
        conn,
        consignment::Entity::find(),
        consignment::Column::ConsignmentId,
    )
    .await?;
    Ok(next_after(CONSIGNMENT_PREFIX, CONSIGNMENT_WIDTH, last.as_deref()))
}

pub async fn next_console_id<C: ConnectionTrait>(conn: &C) -> Result<String, DbErr> {
    let last = highest(conn, console::Entity::find(), console::Column::ConsoleId).await?;
    Ok(next_after(CONSOLE_PREFIX, CONSOLE_WIDTH, last.as_deref()))
}

pub async fn next_xml_id<C: ConnectionTrait>(conn: &C) -> Result<String, DbErr> {
    let last = highest(
        conn,
        consignment::Entity::find().filter(consignment::Column::XmlId.is_not_null()),
        consignment::Column::XmlId,
    )
    .await?;
    Ok(next_after(XML_PREFIX, XML_WIDTH, last.as_deref()))
}

/// Hands out package ids for one consignment, continuing after the highest stored one.
pub struct PackageIdAllocator {
    prefix: String,
    next: u64,
}

impl PackageIdAllocator {
    pub async fn load<C: ConnectionTrait>(
        conn: &C,
        consignment_pk: Uuid,
        consignment_code: &str,
    ) -> Result<Self, DbErr> {
        let prefix = package_prefix(consignment_code);
        let last = highest(
            conn,
            consignment_packaging::Entity::find()
                .filter(consignment_packaging::Column::ConsignmentId.eq(consignment_pk)),
            consignment_packaging::Column::PackageId,
        )
        .await?;
        let next = last
            .as_deref()
            .and_then(|id| parse_sequence(&prefix, id))
            .map(|n| n + 1)
            .unwrap_or(1);
        Ok(Self { prefix, next })
    }

    pub fn next_id(&mut self) -> String {
        let id = format_sequence(&self.prefix, PACKAGE_WIDTH, self.next);
        self.next += 1;
        id
    }
}
