//! A small online shop: its ERP mapping and record builders.
//!
//! The mapping mirrors a typical storefront setup: product categories,
//! products with a nested variant model that the ERP deletes along with
//! its template, countries, organizations, address book entries, orders
//! and order lines.

use erpsync_codec::{Payload, Value};
use erpsync_core::{
    ActionSet, AttrPath, FieldRule, KindMapping, LocalValue, MappingConfig, ModelNode, Record,
};
use erpsync_rpc::MemoryErp;

/// Company id written by static fields.
pub const SHOP_COMPANY_ID: i64 = 1;

/// Parses an attribute path known to be valid.
pub fn path(text: &str) -> AttrPath {
    AttrPath::parse(text).expect("valid attribute path")
}

/// The shop mapping table.
pub fn shop_mapping() -> MappingConfig {
    MappingConfig::new()
        .with_kind(
            "Category",
            KindMapping::new()
                .model(
                    ModelNode::new("product.category")
                        .field("name", FieldRule::direct(path("name")))
                        .field("parent_id", FieldRule::identifier(path("parent"), None, None))
                        .field("type", FieldRule::constant("normal")),
                )
                .with_access_inline(true)
                .with_admin_action("sync_selected"),
        )
        .with_kind(
            "Product",
            KindMapping::new()
                .model(
                    ModelNode::new("product.template")
                        .field(
                            "categ_id",
                            FieldRule::identifier(
                                path("main_category"),
                                Some("Category"),
                                Some("product.category"),
                            ),
                        )
                        .field(
                            "categ_ids",
                            FieldRule::identifier_collection(
                                path("categories"),
                                "Category",
                                Some("product.category"),
                            ),
                        )
                        .field("cost_method", FieldRule::constant("standard"))
                        .field("description_sale", FieldRule::direct_or(path("description"), ""))
                        .field("sale_ok", FieldRule::direct(path("active")))
                        .field("list_price", FieldRule::direct(path("unit_price")))
                        .field("name", FieldRule::direct(path("name")))
                        .field("type", FieldRule::constant("product"))
                        .field("uom_id", FieldRule::constant(1))
                        .field("weight", FieldRule::direct_or(path("weight"), false))
                        .child(
                            ModelNode::new("product.product")
                                .field(
                                    "product_tmpl_id",
                                    FieldRule::identifier(
                                        path("id"),
                                        None,
                                        Some("product.template"),
                                    ),
                                )
                                .field("name_template", FieldRule::direct(path("name")))
                                .field("valuation", FieldRule::constant("manual_periodic"))
                                .auto_delete(true),
                        ),
                )
                .with_access_inline(true)
                .with_admin_action("sync_selected"),
        )
        .with_kind(
            "Country",
            KindMapping::new().model(
                ModelNode::new("res.country")
                    .field("code", FieldRule::direct(path("iso2_code")))
                    .field("name", FieldRule::direct(path("printable_name"))),
            ),
        )
        .with_kind(
            "Organization",
            KindMapping::new().model(
                ModelNode::new("res.partner")
                    .field("name", FieldRule::direct(path("name")))
                    .field("customer", FieldRule::boolean_check(path("role"), "Customer"))
                    .field("supplier", FieldRule::boolean_check(path("role"), "Supplier"))
                    .field("is_company", FieldRule::constant(true))
                    .field("comment", FieldRule::direct_or(path("notes"), "")),
            ),
        )
        .with_kind(
            "AddressBook",
            KindMapping::new().model(
                ModelNode::new("res.partner")
                    .field("name", FieldRule::direct(path("addressee")))
                    .field("street", FieldRule::direct(path("street1")))
                    .field("city", FieldRule::direct(path("city")))
                    .field("zip", FieldRule::direct(path("postal_code")))
                    .field("company_id", FieldRule::constant(SHOP_COMPANY_ID))
                    .field(
                        "country_id",
                        FieldRule::identifier(
                            path("country"),
                            Some("Country"),
                            Some("res.country"),
                        ),
                    )
                    .field(
                        "customer",
                        FieldRule::boolean_check(path("contact.role"), "Customer"),
                    )
                    .field("email", FieldRule::direct(path("contact.email")))
                    .field(
                        "parent_id",
                        FieldRule::identifier(
                            path("contact.organization"),
                            Some("Organization"),
                            None,
                        ),
                    )
                    .field(
                        "phone",
                        FieldRule::direct_or(path("contact.primary_phone.phone"), false),
                    )
                    .field(
                        "type",
                        FieldRule::lookup(
                            path("description"),
                            [
                                ("Billing", "invoice"),
                                ("Shipping", "delivery"),
                                ("_default", "default"),
                            ],
                        ),
                    ),
            ),
        )
        .with_kind(
            "Order",
            KindMapping::new().model(
                ModelNode::new("sale.order")
                    .field("company_id", FieldRule::constant(SHOP_COMPANY_ID))
                    .field("name", FieldRule::constant("/"))
                    .field("order_policy", FieldRule::constant("prepaid"))
                    .field(
                        "partner_id",
                        FieldRule::identifier(
                            path("contact.billing_address"),
                            Some("AddressBook"),
                            Some("res.partner"),
                        ),
                    )
                    .field(
                        "partner_shipping_id",
                        FieldRule::identifier(
                            path("contact.shipping_address"),
                            Some("AddressBook"),
                            Some("res.partner"),
                        ),
                    )
                    .field("note", FieldRule::direct_or(path("notes"), "").on(ActionSet::ALL)),
            ),
        )
        .with_kind(
            "OrderItem",
            KindMapping::new().model(
                ModelNode::new("sale.order.line")
                    .field("name", FieldRule::direct(path("description")))
                    .field(
                        "order_id",
                        FieldRule::identifier(path("order"), Some("Order"), Some("sale.order")),
                    )
                    .field(
                        "product_id",
                        FieldRule::identifier(
                            path("product"),
                            Some("Product"),
                            Some("product.product"),
                        ),
                    )
                    .field("price_unit", FieldRule::direct(path("unit_price")))
                    .field("product_uom_qty", FieldRule::direct(path("quantity"))),
            ),
        )
}

/// An in-memory ERP whose sale orders start out as drafts.
pub fn shop_erp() -> MemoryErp {
    let mut defaults = Payload::new();
    defaults.insert("state".to_string(), Value::from("draft"));
    MemoryErp::new().with_defaults("sale.order", defaults)
}

/// A top-level category.
pub fn category(id: u64, name: &str) -> Record {
    Record::new("Category", id)
        .with("name", name)
        .with("parent", LocalValue::Null)
}

/// A category below `parent`.
pub fn subcategory(id: u64, name: &str, parent: &Record) -> Record {
    category(id, name).with("parent", parent.clone())
}

/// A product listed in `categories`; the first is its main category.
pub fn product(id: u64, name: &str, unit_price: f64, categories: &[&Record]) -> Record {
    let main = categories.first().map(|c| (*c).clone());
    let listed: Vec<LocalValue> = categories
        .iter()
        .map(|c| LocalValue::from((*c).clone()))
        .collect();
    Record::new("Product", id)
        .with("name", name)
        .with("description", format!("{name} from the shop"))
        .with("active", true)
        .with("unit_price", unit_price)
        .with("main_category", main)
        .with("categories", listed)
}

/// A country.
pub fn country(id: u64, iso2_code: &str, printable_name: &str) -> Record {
    Record::new("Country", id)
        .with("iso2_code", iso2_code)
        .with("printable_name", printable_name)
}

/// An organization with a role such as `"Customer"`.
pub fn organization(id: u64, name: &str, role: &str) -> Record {
    Record::new("Organization", id)
        .with("name", name)
        .with("role", role)
}

/// A contact; not mapped itself, reached through addresses and orders.
pub fn contact(id: u64, email: &str, role: &str, organization: Option<&Record>) -> Record {
    Record::new("Contact", id)
        .with("email", email)
        .with("role", role)
        .with("organization", organization.cloned())
        .with("primary_phone", LocalValue::Null)
}

/// An address book entry in `country` belonging to `contact`.
pub fn address(
    id: u64,
    addressee: &str,
    description: &str,
    contact: &Record,
    country: &Record,
) -> Record {
    Record::new("AddressBook", id)
        .with("addressee", addressee)
        .with("description", description)
        .with("street1", format!("{id} Main Street"))
        .with("city", "Springfield")
        .with("postal_code", "12345")
        .with("country", country.clone())
        .with("contact", contact.clone())
}

/// A completed payment.
pub fn payment(id: u64, amount: f64) -> Record {
    Record::new("OrderPayment", id).with("amount", amount)
}

/// An order billed and shipped to `billing`.
pub fn order(id: u64, contact: &Record, billing: &Record, payments: Vec<Record>) -> Record {
    let buyer = contact
        .clone()
        .with("billing_address", billing.clone())
        .with("shipping_address", billing.clone());
    let payments: Vec<LocalValue> = payments.into_iter().map(LocalValue::from).collect();
    Record::new("Order", id)
        .with("contact", buyer)
        .with("payments", payments)
        .with("notes", LocalValue::Null)
}

/// A line of `order` for `product`.
pub fn order_item(id: u64, order: &Record, product: &Record, quantity: i64) -> Record {
    let unit_price = product
        .get("unit_price")
        .unwrap_or(LocalValue::Float(0.0));
    Record::new("OrderItem", id)
        .with("description", product.get("name").unwrap_or(LocalValue::Null))
        .with("order", order.clone())
        .with("product", product.clone())
        .with("unit_price", unit_price)
        .with("quantity", quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_valid() {
        let mapping = shop_mapping();
        mapping.validate().unwrap();
        assert_eq!(mapping.inline_kinds(), ["Category", "Product"]);
        let variant = mapping
            .node_at("Product", &["product.template", "product.product"])
            .unwrap();
        assert!(variant.auto_delete);
    }

    #[test]
    fn builders_nest_records() {
        let root = category(1, "Tools");
        let child = subcategory(2, "Hammers", &root);
        assert_eq!(child.resolve(&path("parent.name")).unwrap(), LocalValue::from("Tools"));

        let de = country(1, "DE", "Germany");
        let buyer = contact(3, "ann@example.com", "Customer", None);
        let billing = address(4, "Ann", "Billing", &buyer, &de);
        let order = order(5, &buyer, &billing, vec![payment(6, 12.5)]);
        assert_eq!(
            order.resolve(&path("contact.billing_address.id")).unwrap(),
            LocalValue::Int(4)
        );
    }
}
