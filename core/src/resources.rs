//! The built-in resource catalogue.
//!
//! Each resource is a `pub const` [`ResourceType`] plus a zero-sized marker
//! type that implements the capability traits it composes. Charges and
//! customers carry a few operations of their own.

use serde_json::json;

use crate::capability::{
    self, Creatable, Deletable, Listable, Resource, Retrievable, Updateable,
};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::list::ListEnvelope;
use crate::record::Record;
use crate::resource::{id_string, Capabilities, ResourceType, Scope};
use crate::Params;

const NONE: Capabilities = Capabilities::NONE;

pub const LIST: ResourceType = ResourceType::new("list", Scope::Merchant, NONE);
pub const CUSTOMER: ResourceType = ResourceType::new("customer", Scope::Merchant, Capabilities::ALL);
pub const CHARGE: ResourceType =
    ResourceType::new("charge", Scope::Merchant, NONE.list().create().update());
pub const CARD: ResourceType = ResourceType::new("card", Scope::Customer, Capabilities::ALL);
pub const BANK_ACCOUNT: ResourceType =
    ResourceType::new("bank_account", Scope::Customer, Capabilities::ALL)
        .with_path("bankaccounts");
pub const PAYOUT: ResourceType = ResourceType::new("payout", Scope::Merchant, NONE.list().create());
pub const FEE: ResourceType = ResourceType::new("fee", Scope::Merchant, NONE.list().create());
pub const PLAN: ResourceType = ResourceType::new("plan", Scope::Merchant, Capabilities::ALL);
pub const SUBSCRIPTION: ResourceType =
    ResourceType::new("subscription", Scope::Customer, Capabilities::ALL);
pub const TRANSFER: ResourceType =
    ResourceType::new("transfer", Scope::Merchant, NONE.list().create().update());
pub const TOKEN: ResourceType = ResourceType::new("token", Scope::Merchant, NONE.create());
pub const CHECKOUT: ResourceType =
    ResourceType::new("checkout", Scope::Merchant, NONE.list().create().update());
pub const WEBHOOK: ResourceType =
    ResourceType::new("webhook", Scope::Merchant, NONE.list().create().delete());

/// Every type registered in a fresh registry.
pub const BUILTIN: &[&ResourceType] = &[
    &LIST,
    &CUSTOMER,
    &CHARGE,
    &CARD,
    &BANK_ACCOUNT,
    &PAYOUT,
    &FEE,
    &PLAN,
    &SUBSCRIPTION,
    &TRANSFER,
    &TOKEN,
    &CHECKOUT,
    &WEBHOOK,
];

/// Drops a scalar `customer` parameter once it has placed the request under
/// that customer's URL.
fn strip_customer(params: &mut Params) {
    if params.get("customer").and_then(id_string).is_some() {
        params.remove("customer");
    }
}

macro_rules! resource {
    ($marker:ident, $ty:ident $(, $cap:ident)*) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $marker;

        impl Resource for $marker {
            const TYPE: &'static ResourceType = &$ty;
        }

        $(impl $cap for $marker {})*
    };
}

resource!(Customer, CUSTOMER, Retrievable, Listable, Creatable, Updateable, Deletable);
resource!(Plan, PLAN, Retrievable, Listable, Creatable, Updateable, Deletable);
resource!(Subscription, SUBSCRIPTION, Retrievable, Listable, Creatable, Updateable, Deletable);
resource!(Fee, FEE, Retrievable, Listable, Creatable);
resource!(Transfer, TRANSFER, Retrievable, Listable, Creatable, Updateable);
resource!(Token, TOKEN, Retrievable, Creatable);
resource!(Checkout, CHECKOUT, Retrievable, Listable, Creatable, Updateable);
resource!(Webhook, WEBHOOK, Retrievable, Listable, Creatable, Deletable);
resource!(Charge, CHARGE, Retrievable, Listable, Updateable);
resource!(Card, CARD, Listable, Updateable, Deletable);
resource!(BankAccount, BANK_ACCOUNT, Retrievable, Listable, Updateable, Deletable);
resource!(Payout, PAYOUT, Retrievable, Listable);

impl Creatable for Charge {
    fn clean_params(params: &mut Params) {
        strip_customer(params);
    }
}

impl Creatable for Card {
    fn clean_params(params: &mut Params) {
        strip_customer(params);
    }
}

impl Creatable for BankAccount {
    fn clean_params(params: &mut Params) {
        strip_customer(params);
    }
}

impl Creatable for Payout {
    fn clean_params(params: &mut Params) {
        strip_customer(params);
    }
}

impl Charge {
    /// POST `<charge>/refund` and refresh the charge.
    pub fn refund(client: &ApiClient, charge: &mut Record, params: Params) -> Result<()> {
        capability::instance_action(client, charge, "refund", params)
    }

    /// POST `<charge>/capture` and refresh the charge.
    pub fn capture(client: &ApiClient, charge: &mut Record, params: Params) -> Result<()> {
        capability::instance_action(client, charge, "capture", params)
    }

    /// Every charge of the merchant, ignoring customer scoping.
    pub fn as_merchant(client: &ApiClient) -> Result<ListEnvelope> {
        capability::list(client, &CHARGE, Params::new(), None)
    }

    pub fn retrieve_as_merchant(client: &ApiClient, id: &str) -> Result<Record> {
        capability::retrieve(client, &CHARGE, Some(id), Params::new(), None)
    }

    /// Create a charge against the merchant's own collection.
    pub fn create_as_merchant(client: &ApiClient, params: Params) -> Result<Record> {
        capability::create(client, &CHARGE, params, None, |_| {})
    }
}

impl Customer {
    pub fn cards<'r>(client: &ApiClient, customer: &'r mut Record) -> Result<&'r ListEnvelope> {
        child_list(client, customer, "cards", &CARD)
    }

    pub fn bank_accounts<'r>(
        client: &ApiClient,
        customer: &'r mut Record,
    ) -> Result<&'r ListEnvelope> {
        child_list(client, customer, "bank_accounts", &BANK_ACCOUNT)
    }

    pub fn payouts<'r>(client: &ApiClient, customer: &'r mut Record) -> Result<&'r ListEnvelope> {
        child_list(client, customer, "payouts", &PAYOUT)
    }

    pub fn transfers<'r>(client: &ApiClient, customer: &'r mut Record) -> Result<&'r ListEnvelope> {
        child_list(client, customer, "transfers", &TRANSFER)
    }

    pub fn charges<'r>(client: &ApiClient, customer: &'r mut Record) -> Result<&'r ListEnvelope> {
        child_list(client, customer, "charges", &CHARGE)
    }

    /// Charge this customer; the charge is created under the customer's URL.
    pub fn create_charge(client: &ApiClient, customer: &Record, mut params: Params) -> Result<Record> {
        params.insert("customer".to_owned(), json!(customer_id(customer)?));
        capability::create(
            client,
            &CHARGE,
            params,
            customer.api_key(),
            <Charge as Creatable>::clean_params,
        )
    }

    pub fn retrieve_charge(client: &ApiClient, customer: &Record, id: &str) -> Result<Record> {
        let mut params = Params::new();
        params.insert("customer".to_owned(), json!(customer_id(customer)?));
        capability::retrieve(client, &CHARGE, Some(id), params, customer.api_key())
    }
}

fn customer_id(customer: &Record) -> Result<String> {
    customer.id().ok_or_else(|| {
        Error::invalid_request(
            "customer has no id; create or retrieve it before reaching its children",
            "id",
        )
    })
}

/// The customer's memoized child collection of `child` items.
fn child_list<'r>(
    client: &ApiClient,
    customer: &'r mut Record,
    key: &'static str,
    child: &'static ResourceType,
) -> Result<&'r ListEnvelope> {
    customer.child_list(key, |customer| {
        let id = customer_id(customer)?;
        let url = child.collection_url(client.config(), Some(&id))?;
        tracing::debug!(url = %url, item_type = child.name, "building child list");
        Ok(ListEnvelope::new(&url, Some(child.name), customer.api_key()))
    })
}
