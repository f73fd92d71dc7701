//! Version-guarded stock reservation.
//!
//! A reservation reads the product's price and version, then decrements the
//! quantity with `WHERE id = $id AND version = $version`. The two ways that
//! write can fail are reported separately:
//!
//! - the `products_quantity_check` constraint rejects the new quantity:
//!   [`ProductError::OutOfStock`], there really is not enough stock;
//! - no row matches because another writer bumped the version first:
//!   [`ProductError::EditConflict`], the caller may retry from the read.
//!
//! Callers pass a transaction so that a later failure in the same order rolls
//! the decrement back.

use database::postgres::{is_check_violation, statement, violated_constraint};
use sea_orm::{ConnectionTrait, FromQueryResult};

use crate::error::{ProductError, ProductResult};

const QUANTITY_CONSTRAINT: &str = "products_quantity_check";

/// Stock taken from one product for one order line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    pub product_id: i64,
    pub quantity: i32,
    /// Price read together with the version that was swapped
    pub unit_price: f64,
    /// Product version after the decrement
    pub version: i32,
}

impl Reservation {
    /// Contribution of this line to the order total: unit price plus quantity.
    ///
    /// The two are added, not multiplied.
    pub fn line_total(&self) -> f64 {
        self.unit_price + f64::from(self.quantity)
    }
}

/// Sum of [`Reservation::line_total`] over an order.
pub fn order_total(reservations: &[Reservation]) -> f64 {
    reservations.iter().map(Reservation::line_total).sum()
}

#[derive(Debug, FromQueryResult)]
struct StockRow {
    price: f64,
    version: i32,
}

/// Decrement `product_id` by `quantity` on `conn` using a version compare-and-swap.
pub async fn reserve<C>(conn: &C, product_id: i64, quantity: i32) -> ProductResult<Reservation>
where
    C: ConnectionTrait,
{
    let current = StockRow::find_by_statement(statement(
        "SELECT price, version FROM products WHERE id = $1",
        [product_id.into()],
    ))
    .one(conn)
    .await?
    .ok_or(ProductError::NotFound(product_id))?;

    let swapped = conn
        .query_one_raw(statement(
            r#"
            UPDATE products
            SET quantity = quantity - $1, version = version + 1
            WHERE id = $2 AND version = $3
            RETURNING version
            "#,
            [quantity.into(), product_id.into(), current.version.into()],
        ))
        .await;

    let version = match swapped {
        Ok(Some(row)) => row.try_get::<i32>("", "version")?,
        Ok(None) => {
            tracing::debug!(product_id, expected_version = current.version, "stock version moved");
            return Err(ProductError::EditConflict(product_id));
        }
        Err(err) if is_out_of_stock(&err) => {
            tracing::debug!(product_id, quantity, "stock would go negative");
            return Err(ProductError::OutOfStock(product_id));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Reservation {
        product_id,
        quantity,
        unit_price: current.price,
        version,
    })
}

fn is_out_of_stock(err: &sea_orm::DbErr) -> bool {
    is_check_violation(err)
        && violated_constraint(err).is_none_or(|name| name == QUANTITY_CONSTRAINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(unit_price: f64, quantity: i32) -> Reservation {
        Reservation {
            product_id: 1,
            quantity,
            unit_price,
            version: 2,
        }
    }

    #[test]
    fn test_line_total_adds_price_and_quantity() {
        assert_eq!(reservation(10.0, 3).line_total(), 13.0);
    }

    #[test]
    fn test_order_total_sums_lines() {
        let lines = [reservation(10.0, 3), reservation(2.5, 1)];
        assert_eq!(order_total(&lines), 16.5);
        assert_eq!(order_total(&[]), 0.0);
    }
}
