//! Proptest strategies for filters, records and export rows.

use proptest::prelude::*;
use uuid::Uuid;

use fulfillment_core::models::Record;

pub const CATEGORIES: [&str; 4] = ["Bars", "Cafes", "Restaurants", "Hotels"];

/// A known category in random letter case
pub fn category_strategy() -> impl Strategy<Value = String> {
    (prop::sample::select(CATEGORIES.to_vec()), any::<bool>()).prop_map(|(category, upper)| {
        if upper {
            category.to_uppercase()
        } else {
            category.to_lowercase()
        }
    })
}

pub fn record_strategy() -> impl Strategy<Value = Record> {
    (category_strategy(), "[A-Za-z ]{1,20}").prop_map(|(category, name)| Record {
        record_id: Uuid::new_v4(),
        business_name: name,
        country: Some("Canada".to_string()),
        state: None,
        city: None,
        address: None,
        phone: None,
        category,
        subcategory: None,
        categories: None,
        attributes: None,
    })
}

/// Encoded rows of varying width, each newline-terminated
pub fn rows_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(
        (1usize..120, any::<u8>()).prop_map(|(len, seed)| {
            let mut row: Vec<u8> = (0..len)
                .map(|i| b'a' + ((seed as usize + i) % 26) as u8)
                .collect();
            row.push(b'\n');
            row
        }),
        0..200,
    )
}
