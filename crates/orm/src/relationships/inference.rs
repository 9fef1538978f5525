//! Naming conventions used to infer tables, foreign keys and pivot tables
//! from model class names.

use heck::ToSnakeCase;

/// Simple pluralization (English-centric)
pub fn pluralize(name: &str) -> String {
    if name.ends_with('y')
        && !["ay", "ey", "iy", "oy", "uy"].iter().any(|suffix| name.ends_with(suffix))
    {
        format!("{}ies", &name[..name.len() - 1])
    } else if ["s", "sh", "ch", "x", "z"].iter().any(|suffix| name.ends_with(suffix)) {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}

/// `OrderItem` -> `order_item`
pub fn snake_name(class_name: &str) -> String {
    class_name.to_snake_case()
}

/// Default table for a model class: `OrderItem` -> `order_items`
pub fn table_name(class_name: &str) -> String {
    pluralize(&snake_name(class_name))
}

/// Default foreign key referencing a model class: `OrderItem` -> `order_item_id`.
/// Class names are already singular.
pub fn foreign_key(class_name: &str) -> String {
    format!("{}_id", snake_name(class_name))
}

/// Default pivot table joining two model classes: both singular snake names
/// sorted alphabetically and joined with `_` (`Tag` + `Product` -> `product_tag`)
pub fn pivot_table(first_class: &str, second_class: &str) -> String {
    let mut names = [snake_name(first_class), snake_name(second_class)];
    names.sort();
    names.join("_")
}

/// Column pair for a polymorphic relation named `name`: `(name_type, name_id)`
pub fn morph_columns(name: &str) -> (String, String) {
    let base = snake_name(name);
    (format!("{}_type", base), format!("{}_id", base))
}
