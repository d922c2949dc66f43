//! API client resource.
//!
//! Uses the generic lifecycle unchanged. The secret is only returned by the
//! API on create, so it is written back only when non-empty, and a revoked
//! client reads as absent.

use crate::api::{
    ApiClient, ApiClientOptions, ApiFuture, CloudApi, PERMISSIONS_GROUPS,
};
use crate::diag::Diagnostics;
use crate::lifecycle::Descriptor;
use crate::schema::{
    FieldKind, FieldSchema, ResourceData, ResourceSchema, Timeouts, assign_enum, assign_string,
    field_diagnostic,
};

static FIELDS: [FieldSchema; 5] = [
    FieldSchema::computed("account", FieldKind::String)
        .describe("The account the API client relates to"),
    FieldSchema::optional("description", FieldKind::String)
        .describe("Verbose Description of this client"),
    FieldSchema::optional("name", FieldKind::String).describe("Human Readable Name"),
    FieldSchema::optional("permissions_group", FieldKind::Enum(PERMISSIONS_GROUPS))
        .describe("Summary of the permissions granted to the client (full, storage)")
        .with_default("full"),
    FieldSchema::computed("secret", FieldKind::String)
        .describe("A shared secret the client must present when authenticating")
        .sensitive(),
];

/// Attribute table for API clients.
pub static SCHEMA: ResourceSchema = ResourceSchema {
    label: "API client",
    fields: &FIELDS,
    timeouts: Timeouts::standard(),
};

/// Lifecycle binding for API clients.
pub static DESCRIPTOR: Descriptor<ApiClient, ApiClientOptions> = Descriptor {
    label: "API client",
    create: create_call,
    read: read_call,
    update: update_call,
    delete: delete_call,
    options_from_id: api_client_from_id,
    add_options: add_updateable_options,
    set_attributes: set_api_client_attributes,
    resource_id: api_client_id,
    is_absent: is_revoked,
};

fn create_call<'a>(api: &'a dyn CloudApi, opts: &'a ApiClientOptions) -> ApiFuture<'a, ApiClient> {
    api.create_api_client(opts)
}

fn read_call<'a>(api: &'a dyn CloudApi, id: &'a str) -> ApiFuture<'a, ApiClient> {
    api.api_client(id)
}

fn update_call<'a>(api: &'a dyn CloudApi, opts: &'a ApiClientOptions) -> ApiFuture<'a, ApiClient> {
    api.update_api_client(opts)
}

fn delete_call<'a>(api: &'a dyn CloudApi, id: &'a str) -> ApiFuture<'a, ()> {
    api.destroy_api_client(id)
}

fn api_client_from_id(id: &str) -> ApiClientOptions {
    ApiClientOptions {
        id: id.to_string(),
        ..ApiClientOptions::default()
    }
}

fn api_client_id(client: &ApiClient) -> &str {
    &client.id
}

fn is_revoked(client: &ApiClient) -> bool {
    client.revoked_at.is_some()
}

fn add_updateable_options(d: &ResourceData, opts: &mut ApiClientOptions) -> Diagnostics {
    assign_string(d, &mut opts.name, "name");
    assign_string(d, &mut opts.description, "description");
    assign_enum(d, &mut opts.permissions_group, "permissions_group")
}

fn set_api_client_attributes(d: &mut ResourceData, client: &ApiClient) -> Diagnostics {
    let mut diags = Diagnostics::new();
    let account = client.account.as_ref().map(|a| a.id.as_str()).unwrap_or_default();

    let mut values = vec![
        ("name", client.name.as_str()),
        ("description", client.description.as_str()),
        ("permissions_group", client.permissions_group.as_str()),
        ("account", account),
    ];
    if !client.secret.is_empty() {
        values.push(("secret", client.secret.as_str()));
    }

    for (name, value) in values {
        if let Err(err) = d.set(name, value) {
            diags.push(field_diagnostic(&err));
        }
    }
    diags
}
