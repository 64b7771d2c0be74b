//! The fixed table of remote actions exposed by the SendParcel API.
//!
//! # Design
//! Every endpoint is addressed by appending its remote name to the base URL.
//! The remote name is the snake_case form of the client method name, so the
//! table stores the method name and `snake_case` derives the route. Tests
//! pin the derived names so a typo in either column shows up immediately.

use std::fmt;

/// One remote operation of the SendParcel API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Me,
    GetPostcodeDetails,
    CheckPrice,
    GetParcelSizes,
    GetContentTypes,
    CreateShipment,
    GetCartItems,
    Checkout,
    GetShipmentStatuses,
    GetShipments,
    GetShipmentHistory,
    GetConsignmentNote,
    CheckPriceBulk,
    CreateBulkAwb,
    GetBulkTrackingNo,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::Me,
        Action::GetPostcodeDetails,
        Action::CheckPrice,
        Action::GetParcelSizes,
        Action::GetContentTypes,
        Action::CreateShipment,
        Action::GetCartItems,
        Action::Checkout,
        Action::GetShipmentStatuses,
        Action::GetShipments,
        Action::GetShipmentHistory,
        Action::GetConsignmentNote,
        Action::CheckPriceBulk,
        Action::CreateBulkAwb,
        Action::GetBulkTrackingNo,
    ];

    /// The camelCase name the API documentation uses for this action.
    pub fn method_name(self) -> &'static str {
        match self {
            Action::Me => "me",
            Action::GetPostcodeDetails => "getPostcodeDetails",
            Action::CheckPrice => "checkPrice",
            Action::GetParcelSizes => "getParcelSizes",
            Action::GetContentTypes => "getContentTypes",
            Action::CreateShipment => "createShipment",
            Action::GetCartItems => "getCartItems",
            Action::Checkout => "checkout",
            Action::GetShipmentStatuses => "getShipmentStatuses",
            Action::GetShipments => "getShipments",
            Action::GetShipmentHistory => "getShipmentHistory",
            Action::GetConsignmentNote => "getConsignmentNote",
            Action::CheckPriceBulk => "checkPriceBulk",
            Action::CreateBulkAwb => "createBulkAwb",
            Action::GetBulkTrackingNo => "getBulkTrackingNo",
        }
    }

    /// The path segment appended to the base URL.
    pub fn remote_name(self) -> String {
        snake_case(self.method_name())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Insert `_` before every ASCII upper-case letter except a leading one,
/// then lower-case the whole string.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
