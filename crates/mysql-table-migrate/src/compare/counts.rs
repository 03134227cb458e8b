//! Row counting with failure sentinels.

use tracing::debug;

use crate::core::traits::CatalogReader;

/// Sentinel for a count that could not be obtained.
pub const COUNT_UNAVAILABLE: i64 = -1;

/// Count rows in `table`, exactly or from the catalog estimate.
///
/// Never fails: any error, or a table missing from the catalog when
/// approximating, yields [`COUNT_UNAVAILABLE`].
pub async fn count_rows<C>(db: &C, table: &str, approximate: bool) -> i64
where
    C: CatalogReader + ?Sized,
{
    if approximate {
        match db.estimated_row_count(table).await {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                debug!("No catalog entry for {}.{}", db.database(), table);
                COUNT_UNAVAILABLE
            }
            Err(e) => {
                debug!("Estimated count failed for {}.{}: {}", db.database(), table, e);
                COUNT_UNAVAILABLE
            }
        }
    } else {
        match db.exact_row_count(table).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("COUNT(*) failed for {}.{}: {}", db.database(), table, e);
                COUNT_UNAVAILABLE
            }
        }
    }
}
