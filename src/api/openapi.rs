use super::error::ErrorBody;
use super::handlers::{
    admin, auth, cart, health,
    orders::{self, DeliveryType, OrderStatus},
    products,
};
use utoipa::{
    openapi::{Contact, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::otp::send_otp,
        auth::otp::verify_otp,
        auth::mobile::mobile_login,
        auth::session::session,
        auth::session::logout,
        auth::account::update_name,
        auth::account::delete_account,
        products::list,
        products::get,
        products::create,
        products::update,
        products::remove,
        cart::view,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::place,
        orders::list,
        orders::get,
        admin::check,
        admin::stats,
        admin::orders,
        admin::update_order,
    ),
    components(schemas(
        ErrorBody,
        health::Health,
        auth::types::SendCodeRequest,
        auth::types::SendCodeResponse,
        auth::types::CodeRequest,
        auth::types::UserSummary,
        auth::types::VerifyCodeResponse,
        auth::types::MobileUser,
        auth::types::MobileLoginResponse,
        auth::types::UpdateNameRequest,
        auth::types::UpdateNameResponse,
        auth::types::MessageResponse,
        products::Product,
        products::ProductsResponse,
        products::ProductResponse,
        products::ProductInput,
        cart::CartLine,
        cart::CartView,
        cart::CartResponse,
        cart::AddItemRequest,
        cart::UpdateItemRequest,
        OrderStatus,
        DeliveryType,
        orders::OrderItemInput,
        orders::AddressInput,
        orders::PlaceOrderRequest,
        orders::PlaceOrderResponse,
        orders::OrderItemView,
        orders::OrderView,
        orders::OrdersResponse,
        orders::OrderResponse,
        admin::AdminCheckResponse,
        admin::DashboardStats,
        admin::AdminOrderView,
        admin::StatsResponse,
        admin::AdminOrdersResponse,
        admin::AdminOrderResponse,
        admin::UpdateStatusRequest,
    )),
    tags(
        (name = "health", description = "Liveness and database reachability"),
        (name = "auth", description = "One-time code sign-in, sessions and account"),
        (name = "products", description = "Menu"),
        (name = "cart", description = "Caller's cart"),
        (name = "orders", description = "Checkout and order history"),
        (name = "admin", description = "Admin console")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();
    doc
}

fn cargo_info() -> utoipa::openapi::Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => {
            let name = author[..start].trim();
            let email = author[start + 1..].trim_end_matches('>').trim();
            (
                Some(name).filter(|name| !name.is_empty()),
                Some(email).filter(|email| !email.is_empty()),
            )
        }
        None => (Some(author.trim()).filter(|name| !name.is_empty()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("The BP Street"));
            assert_eq!(contact.email.as_deref(), Some("dev@thebpstreet.in"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let doc = openapi();
        let tags = doc.tags.clone().unwrap_or_default();
        for name in ["auth", "products", "cart", "orders", "admin", "health"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
        for path in [
            "/health",
            "/api/auth/send-otp",
            "/api/auth/verify-otp",
            "/api/auth/mobile-login",
            "/api/auth/session",
            "/api/auth/logout",
            "/api/auth/update-name",
            "/api/auth/delete-account",
            "/api/products",
            "/api/products/{id}",
            "/api/cart",
            "/api/orders",
            "/api/orders/{id}",
            "/api/admin/check",
            "/api/admin/stats",
            "/api/admin/orders",
            "/api/admin/orders/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn order_request_schemas_are_documented() -> anyhow::Result<()> {
        let doc = serde_json::to_value(openapi())?;
        let schemas = &doc["components"]["schemas"];
        for name in ["PlaceOrderRequest", "OrderItemInput", "AddressInput"] {
            assert!(schemas[name].is_object(), "missing schema {name}");
        }
        let items = &schemas["PlaceOrderRequest"]["properties"]["items"];
        assert!(items.is_object());
        assert!(schemas["PlaceOrderRequest"]["properties"]["deliveryType"].is_object());
        Ok(())
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("The BP Street <dev@thebpstreet.in>"),
            (Some("The BP Street"), Some("dev@thebpstreet.in"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<>"), (None, None));
    }
}
