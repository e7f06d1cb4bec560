//! `config_server_git_setting`: the Git backend of a service's config server.
//!
//! The API masks credentials on read, so flattening takes usernames,
//! passwords and keys from the values already held for the resource.

use anyhow::Result;
use azrm_core::data::{block_bool, block_str, string_list};
use azrm_core::schema::{AttributeSchema, Validator};
use azrm_core::ResourceData;
use serde_json::{json, Map as JsonMap, Value as Json};

pub(crate) const ATTRIBUTE: &str = "config_server_git_setting";

type Block = JsonMap<String, Json>;

const HOST_KEY_ALGORITHMS: &[&str] = &["ssh-dss", "ssh-rsa", "ecdsa-sha2-nistp256", "ecdsa-sha2-nistp384", "ecdsa-sha2-nistp521"];

fn uri() -> AttributeSchema {
    AttributeSchema::string("uri").required().validate(Validator::Regex {
        pattern: r"^(https?://|git@|ssh://)\S+$",
        message: "the URI must start with http://, https://, git@ or ssh://",
    })
}

fn search_paths() -> AttributeSchema { AttributeSchema::string_list("search_paths").validate(Validator::NotEmpty) }

fn http_basic_auth() -> AttributeSchema {
    AttributeSchema::block("http_basic_auth", vec![
        AttributeSchema::string("username").required(),
        AttributeSchema::string("password").required().sensitive(),
    ])
    .max_items(1)
}

fn ssh_auth() -> AttributeSchema {
    AttributeSchema::block("ssh_auth", vec![
        AttributeSchema::string("private_key").required().sensitive(),
        AttributeSchema::string("host_key").sensitive(),
        AttributeSchema::string("host_key_algorithm").validate(Validator::StringInSlice { values: HOST_KEY_ALGORITHMS, ignore_case: false }),
        AttributeSchema::bool("strict_host_key_checking_enabled").default(true),
    ])
    .max_items(1)
}

pub(crate) fn schema() -> AttributeSchema {
    AttributeSchema::block(ATTRIBUTE, vec![
        uri(),
        AttributeSchema::string("label"),
        search_paths(),
        http_basic_auth().conflicts_with(&["ssh_auth"]),
        ssh_auth().conflicts_with(&["http_basic_auth"]),
        AttributeSchema::block("repository", vec![
            AttributeSchema::string("name").required().validate(Validator::NotEmpty),
            uri(),
            AttributeSchema::string("label"),
            AttributeSchema::string_list("pattern").validate(Validator::NotEmpty),
            search_paths(),
            http_basic_auth(),
            ssh_auth(),
        ]),
    ])
    .max_items(1)
}

fn first_block<'a>(block: &'a Block, key: &str) -> Option<&'a Block> {
    block.get(key)?.as_array()?.first()?.as_object()
}

fn insert_non_empty(target: &mut Block, key: &str, value: &str) {
    if !value.is_empty() {
        target.insert(key.to_string(), json!(value));
    }
}

fn insert_list(target: &mut Block, key: &str, values: Vec<String>) {
    if !values.is_empty() {
        target.insert(key.to_string(), json!(values));
    }
}

fn expand_auth(block: &Block, target: &mut Block, conflict: &str) -> Result<()> {
    let http = first_block(block, "http_basic_auth");
    let ssh = first_block(block, "ssh_auth");
    if http.is_some() && ssh.is_some() {
        anyhow::bail!("{conflict}");
    }
    if let Some(h) = http {
        target.insert("username".into(), json!(block_str(h, "username")));
        target.insert("password".into(), json!(block_str(h, "password")));
    }
    if let Some(s) = ssh {
        target.insert("privateKey".into(), json!(block_str(s, "private_key")));
        target.insert("strictHostKeyChecking".into(), json!(block_bool(s, "strict_host_key_checking_enabled")));
        insert_non_empty(target, "hostKey", block_str(s, "host_key"));
        insert_non_empty(target, "hostKeyAlgorithm", block_str(s, "host_key_algorithm"));
    }
    Ok(())
}

/// `None` when no Git setting is configured.
pub(crate) fn expand(d: &ResourceData) -> Result<Option<Json>> {
    let Some(setting) = d.get_block(ATTRIBUTE) else { return Ok(None) };

    let mut git = Block::new();
    git.insert("uri".into(), json!(block_str(setting, "uri")));
    insert_non_empty(&mut git, "label", block_str(setting, "label"));
    insert_list(&mut git, "searchPaths", string_list(setting.get("search_paths")));
    expand_auth(setting, &mut git, "can not set both `http_basic_auth` and `ssh_auth`")?;

    let mut repositories = Vec::new();
    for repo in setting.get("repository").and_then(Json::as_array).into_iter().flatten().filter_map(Json::as_object) {
        let mut r = Block::new();
        r.insert("name".into(), json!(block_str(repo, "name")));
        r.insert("uri".into(), json!(block_str(repo, "uri")));
        insert_non_empty(&mut r, "label", block_str(repo, "label"));
        insert_list(&mut r, "pattern", string_list(repo.get("pattern")));
        insert_list(&mut r, "searchPaths", string_list(repo.get("search_paths")));
        expand_auth(repo, &mut r, "can not set both `http_basic_auth` and `ssh_auth` for the same repository")?;
        repositories.push(Json::Object(r));
    }
    if !repositories.is_empty() {
        git.insert("repositories".into(), Json::Array(repositories));
    }
    Ok(Some(Json::Object(git)))
}

fn present(remote: &Json, key: &str) -> bool {
    remote.get(key).is_some_and(|v| !v.is_null())
}

fn flatten_auth(remote: &Json, old: Option<&Block>) -> (Json, Json) {
    let old_http = old.and_then(|o| first_block(o, "http_basic_auth"));
    let old_ssh = old.and_then(|o| first_block(o, "ssh_auth"));
    let prior = |b: Option<&Block>, k: &str| b.map(|b| block_str(b, k).to_string()).unwrap_or_default();

    let http = if present(remote, "username") && present(remote, "password") {
        json!([{ "username": prior(old_http, "username"), "password": prior(old_http, "password") }])
    } else {
        json!([])
    };
    let ssh = if present(remote, "privateKey") {
        json!([{
            "private_key": prior(old_ssh, "private_key"),
            "host_key": prior(old_ssh, "host_key"),
            "host_key_algorithm": prior(old_ssh, "host_key_algorithm"),
            "strict_host_key_checking_enabled": remote.get("strictHostKeyChecking").and_then(Json::as_bool).unwrap_or_default(),
        }])
    } else {
        json!([])
    };
    (http, ssh)
}

fn strings(remote: &Json, key: &str) -> Json {
    json!(string_list(remote.get(key)))
}

/// `old` is the block currently held for the resource (configuration or prior state).
pub(crate) fn flatten(remote: Option<&Json>, old: Option<&Block>) -> Json {
    let Some(git) = remote.filter(|g| g.is_object()) else { return json!([]) };
    let text = |v: &Json, k: &str| v.get(k).and_then(Json::as_str).unwrap_or_default().to_string();

    let old_repos: Vec<&Block> = old
        .and_then(|o| o.get("repository"))
        .and_then(Json::as_array)
        .into_iter()
        .flatten()
        .filter_map(Json::as_object)
        .collect();

    let repositories: Vec<Json> = git
        .get("repositories")
        .and_then(Json::as_array)
        .into_iter()
        .flatten()
        .map(|repo| {
            let name = text(repo, "name");
            let previous = old_repos.iter().copied().find(|r| block_str(r, "name") == name);
            let (http, ssh) = flatten_auth(repo, previous);
            json!({
                "name": name,
                "uri": text(repo, "uri"),
                "label": text(repo, "label"),
                "pattern": strings(repo, "pattern"),
                "search_paths": strings(repo, "searchPaths"),
                "http_basic_auth": http,
                "ssh_auth": ssh,
            })
        })
        .collect();

    let (http, ssh) = flatten_auth(git, old);
    json!([{
        "uri": text(git, "uri"),
        "label": text(git, "label"),
        "search_paths": strings(git, "searchPaths"),
        "http_basic_auth": http,
        "ssh_auth": ssh,
        "repository": repositories,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use azrm_core::ResourceSchema;

    fn data(v: Json) -> ResourceData { ResourceData::new(v.as_object().cloned().unwrap()) }

    #[test]
    fn expands_auth_and_pattern_repositories() {
        let d = data(json!({ ATTRIBUTE: [{
            "uri": "https://github.com/org/config",
            "search_paths": ["dir1"],
            "http_basic_auth": [{ "username": "u", "password": "p" }],
            "repository": [{ "name": "repo1", "uri": "git@github.com:org/r1", "pattern": ["app*"],
                             "ssh_auth": [{ "private_key": "k", "strict_host_key_checking_enabled": false }] }],
        }] }));
        let git = expand(&d).unwrap().unwrap();
        assert_eq!(git["uri"], json!("https://github.com/org/config"));
        assert_eq!(git["searchPaths"], json!(["dir1"]));
        assert_eq!(git["password"], json!("p"));
        assert_eq!(git["repositories"][0]["pattern"], json!(["app*"]));
        assert_eq!(git["repositories"][0]["strictHostKeyChecking"], json!(false));
        assert!(git.get("label").is_none());
    }

    #[test]
    fn both_auth_kinds_are_rejected() {
        let d = data(json!({ ATTRIBUTE: [{
            "uri": "https://x/y",
            "http_basic_auth": [{ "username": "u", "password": "p" }],
            "ssh_auth": [{ "private_key": "k" }],
        }] }));
        assert!(expand(&d).unwrap_err().to_string().contains("can not set both"));
    }

    #[test]
    fn schema_reports_conflicting_auth() {
        let schema = ResourceSchema::new("t").attribute(schema());
        let cfg = json!({ ATTRIBUTE: [{
            "uri": "https://x/y",
            "http_basic_auth": [{ "username": "u", "password": "p" }],
            "ssh_auth": [{ "private_key": "k" }],
        }] });
        assert!(schema.validate(cfg.as_object().unwrap()).is_err());
    }

    #[test]
    fn masked_credentials_come_from_the_old_block() {
        let remote = json!({
            "uri": "https://x/y",
            "username": "*",
            "password": "*",
            "repositories": [{ "name": "r1", "uri": "git@x:y", "privateKey": "*", "strictHostKeyChecking": true }],
        });
        let old = json!({
            "uri": "https://x/y",
            "http_basic_auth": [{ "username": "alice", "password": "secret" }],
            "repository": [{ "name": "r1", "uri": "git@x:y", "ssh_auth": [{ "private_key": "pem", "host_key": "", "host_key_algorithm": "" }] }],
        });
        let flat = flatten(Some(&remote), old.as_object());
        assert_eq!(flat[0]["http_basic_auth"], json!([{ "username": "alice", "password": "secret" }]));
        assert_eq!(flat[0]["repository"][0]["ssh_auth"][0]["private_key"], json!("pem"));
        assert_eq!(flat[0]["repository"][0]["ssh_auth"][0]["strict_host_key_checking_enabled"], json!(true));
        assert_eq!(flatten(None, None), json!([]));
    }
}
