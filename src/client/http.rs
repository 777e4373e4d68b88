//! Blocking HTTP implementation of the remote API traits.
//!
//! Calls are synchronous and issued one at a time; there is no retry or
//! backoff here - a rejected or failed call aborts the current
//! reconciliation pass.

use super::{BalancerApi, CreatedInstance, DomainApi, InstanceApi, VolumeApi};
use crate::error::{Error, Result};
use crate::model::{
    Balancer, BalancerConfig, BalancerNode, Domain, DomainRecord, Instance, Volume,
};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

/// Rejection payload returned by the remote API.
#[derive(Debug, Deserialize)]
struct ApiErrors {
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    reason: String,
    field: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RdnsBody {
    rdns: Option<String>,
}

/// Bearer-token client for the cloud API.
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        // Non-2xx responses carry a structured rejection body; keep them as
        // responses instead of transport errors so it can be read.
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            agent: config.new_agent(),
            base_url,
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {path}");
        let response = self
            .agent
            .get(self.url(path))
            .header("Authorization", self.auth())
            .call()?;
        read_body(response)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, payload: &Value) -> Result<T> {
        debug!("POST {path}");
        let response = self
            .agent
            .post(self.url(path))
            .header("Authorization", self.auth())
            .send_json(payload)?;
        read_body(response)
    }

    fn post_unit(&self, path: &str, payload: &Value) -> Result<()> {
        debug!("POST {path}");
        let response = self
            .agent
            .post(self.url(path))
            .header("Authorization", self.auth())
            .send_json(payload)?;
        check_status(response)
    }

    fn put(&self, path: &str, payload: &Value) -> Result<()> {
        debug!("PUT {path}");
        let response = self
            .agent
            .put(self.url(path))
            .header("Authorization", self.auth())
            .send_json(payload)?;
        check_status(response)
    }

    fn delete(&self, path: &str) -> Result<()> {
        debug!("DELETE {path}");
        let response = self
            .agent
            .delete(self.url(path))
            .header("Authorization", self.auth())
            .call()?;
        check_status(response)
    }

    fn find_labeled<T: DeserializeOwned>(
        &self,
        path: &str,
        label: &str,
        get_label: impl Fn(&T) -> &str,
    ) -> Result<Option<T>> {
        let page: Page<T> = self.get(&format!("{path}?label={label}"))?;
        Ok(page.data.into_iter().find(|item| get_label(item) == label))
    }
}

/// Parse a success body, or surface the remote rejection.
fn read_body<T: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.body_mut().read_json::<T>().map_err(Error::from);
    }
    Err(rejection(status.as_u16(), response))
}

fn check_status(response: ureq::http::Response<ureq::Body>) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(rejection(status.as_u16(), response))
}

fn rejection(status: u16, mut response: ureq::http::Response<ureq::Body>) -> Error {
    match response.body_mut().read_json::<ApiErrors>() {
        Ok(body) if !body.errors.is_empty() => {
            Error::remote(body.errors.into_iter().map(|e| match e.field {
                Some(field) => format!("{field}: {}", e.reason),
                None => e.reason,
            }))
        }
        _ => Error::Transport(format!("HTTP {status}")),
    }
}

impl InstanceApi for HttpClient {
    fn instance_find(&self, label: &str) -> Result<Option<Instance>> {
        self.find_labeled("/instances", label, |i: &Instance| &i.label)
    }

    fn instance_create(&self, fields: &Map<String, Value>) -> Result<CreatedInstance> {
        // The instance body carries a root_pass sibling when the remote
        // generated the credential.
        let mut body: Map<String, Value> = self.post("/instances", &Value::Object(fields.clone()))?;
        let root_pass = body
            .remove("root_pass")
            .and_then(|v| v.as_str().map(str::to_owned))
            .filter(|_| !fields.contains_key("root_pass"));
        let instance: Instance = serde_json::from_value(Value::Object(body))?;
        Ok(CreatedInstance {
            instance,
            root_pass,
        })
    }

    fn instance_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.put(&format!("/instances/{id}"), &Value::Object(patch.clone()))
    }

    fn instance_delete(&self, id: i64) -> Result<()> {
        self.delete(&format!("/instances/{id}"))
    }

    fn instance_private_ips(&self, id: i64) -> Result<Vec<String>> {
        let page: Page<String> = self.get(&format!("/instances/{id}/private-ips"))?;
        Ok(page.data)
    }

    fn instance_allocate_private_ip(&self, id: i64) -> Result<()> {
        self.post_unit(&format!("/instances/{id}/private-ips"), &json!({}))
    }

    fn instance_rdns(&self, id: i64) -> Result<Option<String>> {
        let body: RdnsBody = self.get(&format!("/instances/{id}/rdns"))?;
        Ok(body.rdns)
    }

    fn instance_set_rdns(&self, id: i64, rdns: &str) -> Result<()> {
        self.put(&format!("/instances/{id}/rdns"), &json!({ "rdns": rdns }))
    }
}

impl VolumeApi for HttpClient {
    fn volume_find(&self, label: &str) -> Result<Option<Volume>> {
        self.find_labeled("/volumes", label, |v: &Volume| &v.label)
    }

    fn volume_create(&self, fields: &Map<String, Value>) -> Result<Volume> {
        self.post("/volumes", &Value::Object(fields.clone()))
    }

    fn volume_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.put(&format!("/volumes/{id}"), &Value::Object(patch.clone()))
    }

    fn volume_delete(&self, id: i64) -> Result<()> {
        self.delete(&format!("/volumes/{id}"))
    }

    fn volume_attach(&self, id: i64, instance_id: i64) -> Result<()> {
        self.post_unit(
            &format!("/volumes/{id}/attach"),
            &json!({ "instance_id": instance_id }),
        )
    }

    fn volume_detach(&self, id: i64) -> Result<()> {
        self.post_unit(&format!("/volumes/{id}/detach"), &json!({}))
    }

    fn volume_resize(&self, id: i64, size: u64) -> Result<()> {
        self.post_unit(&format!("/volumes/{id}/resize"), &json!({ "size": size }))
    }
}

impl DomainApi for HttpClient {
    fn domain_find(&self, name: &str) -> Result<Option<Domain>> {
        let page: Page<Domain> = self.get(&format!("/domains?domain={name}"))?;
        Ok(page.data.into_iter().find(|d| d.domain == name))
    }

    fn domain_create(&self, fields: &Map<String, Value>) -> Result<Domain> {
        self.post("/domains", &Value::Object(fields.clone()))
    }

    fn domain_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.put(&format!("/domains/{id}"), &Value::Object(patch.clone()))
    }

    fn domain_delete(&self, id: i64) -> Result<()> {
        self.delete(&format!("/domains/{id}"))
    }

    fn record_list(&self, domain_id: i64) -> Result<Vec<DomainRecord>> {
        let page: Page<DomainRecord> = self.get(&format!("/domains/{domain_id}/records"))?;
        Ok(page.data)
    }

    fn record_create(&self, domain_id: i64, fields: &Map<String, Value>) -> Result<DomainRecord> {
        self.post(
            &format!("/domains/{domain_id}/records"),
            &Value::Object(fields.clone()),
        )
    }

    fn record_update(
        &self,
        domain_id: i64,
        record_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.put(
            &format!("/domains/{domain_id}/records/{record_id}"),
            &Value::Object(patch.clone()),
        )
    }

    fn record_delete(&self, domain_id: i64, record_id: i64) -> Result<()> {
        self.delete(&format!("/domains/{domain_id}/records/{record_id}"))
    }
}

impl BalancerApi for HttpClient {
    fn balancer_find(&self, label: &str) -> Result<Option<Balancer>> {
        self.find_labeled("/balancers", label, |b: &Balancer| &b.label)
    }

    fn balancer_create(&self, fields: &Map<String, Value>) -> Result<Balancer> {
        self.post("/balancers", &Value::Object(fields.clone()))
    }

    fn balancer_update(&self, id: i64, patch: &Map<String, Value>) -> Result<()> {
        self.put(&format!("/balancers/{id}"), &Value::Object(patch.clone()))
    }

    fn balancer_delete(&self, id: i64) -> Result<()> {
        self.delete(&format!("/balancers/{id}"))
    }

    fn balancer_rdns(&self, id: i64) -> Result<Option<String>> {
        let body: RdnsBody = self.get(&format!("/balancers/{id}/rdns"))?;
        Ok(body.rdns)
    }

    fn balancer_set_rdns(&self, id: i64, rdns: &str) -> Result<()> {
        self.put(&format!("/balancers/{id}/rdns"), &json!({ "rdns": rdns }))
    }

    fn config_list(&self, balancer_id: i64) -> Result<Vec<BalancerConfig>> {
        let page: Page<BalancerConfig> = self.get(&format!("/balancers/{balancer_id}/configs"))?;
        Ok(page.data)
    }

    fn config_create(
        &self,
        balancer_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<BalancerConfig> {
        self.post(
            &format!("/balancers/{balancer_id}/configs"),
            &Value::Object(fields.clone()),
        )
    }

    fn config_update(
        &self,
        balancer_id: i64,
        config_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.put(
            &format!("/balancers/{balancer_id}/configs/{config_id}"),
            &Value::Object(patch.clone()),
        )
    }

    fn config_delete(&self, balancer_id: i64, config_id: i64) -> Result<()> {
        self.delete(&format!("/balancers/{balancer_id}/configs/{config_id}"))
    }

    fn node_list(&self, balancer_id: i64, config_id: i64) -> Result<Vec<BalancerNode>> {
        let page: Page<BalancerNode> =
            self.get(&format!("/balancers/{balancer_id}/configs/{config_id}/nodes"))?;
        Ok(page.data)
    }

    fn node_create(
        &self,
        balancer_id: i64,
        config_id: i64,
        fields: &Map<String, Value>,
    ) -> Result<BalancerNode> {
        self.post(
            &format!("/balancers/{balancer_id}/configs/{config_id}/nodes"),
            &Value::Object(fields.clone()),
        )
    }

    fn node_update(
        &self,
        balancer_id: i64,
        config_id: i64,
        node_id: i64,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        self.put(
            &format!("/balancers/{balancer_id}/configs/{config_id}/nodes/{node_id}"),
            &Value::Object(patch.clone()),
        )
    }

    fn node_delete(&self, balancer_id: i64, config_id: i64, node_id: i64) -> Result<()> {
        self.delete(&format!(
            "/balancers/{balancer_id}/configs/{config_id}/nodes/{node_id}"
        ))
    }
}
