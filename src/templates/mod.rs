//! Remote `occ` command templates and placeholder substitution.
//!
//! The configuration sequence is fixed: install and enable the OAuth2 and
//! RDS apps, register an OAuth2 client for the research data service, and
//! point the RDS app at the service. Two diagnostic commands are used
//! afterwards to discover the instance's public address.

use std::borrow::Cow;

use shell_escape::unix::escape;

use crate::credentials::CredentialPair;

/// OAuth client display name used when the inventory does not set one.
pub const DEFAULT_OAUTH_NAME: &str = "sciebo-rds";

/// Ordered configuration commands sent to every instance.
pub const COMMAND_TEMPLATES: [&str; 7] = [
    "{owncloud_path}occ market:install oauth2",
    "{owncloud_path}occ market:install rds",
    "{owncloud_path}occ app:enable oauth2",
    "{owncloud_path}occ app:enable rds",
    "{owncloud_path}occ oauth2:add-client {oauthname} {client_id} {client_secret} {rds_domain}",
    "{owncloud_path}occ rds:set-oauthname {oauthname}",
    "{owncloud_path}occ rds:set-url {rds_domain}",
];

/// Prints the system hostname of the remote instance.
pub const HOSTNAME_PROBE: &str = r#"php -r "echo gethostname();""#;

/// Lists the configuration keys that override the public hostname.
pub const OVERRIDE_SCAN_TEMPLATE: &str =
    r#"{owncloud_path}occ config:list | grep "overwritehost\|overwrite.cli.url""#;

const CONDITIONS: &str = r#"Conditions:
$CLIENT_ID and $CLIENT_SECRET have a length of 64 characters (no special characters like [/\.,] allowed).
$OWNCLOUD_PATH is empty "" (occ can be found through $PATH) or set to a folder with trailing slash / e.g. /var/www/owncloud/
$OAUTHNAME is not in use for oauth2 already.
$RDS_DOMAIN points to the sciebo-rds installation root domain.

Remember that you also need the domain name of the owncloud instance to configure the values.yaml, which will be guessed automatically by rds-install.
"#;

/// Values substituted into the templates for one server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandContext {
    owncloud_path: String,
    oauthname: String,
    client_id: String,
    client_secret: String,
    rds_domain: String,
}

impl CommandContext {
    /// Builds a context for a real run.
    ///
    /// Values are shell-quoted when they contain characters outside the
    /// shell-safe set; plain paths, domains and generated credentials render
    /// verbatim. `owncloud_path` must already be normalised (see
    /// [`normalise_install_path`]).
    #[must_use]
    pub fn new(
        owncloud_path: &str,
        oauthname: &str,
        credentials: &CredentialPair,
        rds_domain: &str,
    ) -> Self {
        Self {
            owncloud_path: quote(owncloud_path),
            oauthname: quote(oauthname),
            client_id: quote(credentials.client_id()),
            client_secret: quote(credentials.client_secret()),
            rds_domain: quote(rds_domain),
        }
    }

    /// Builds a context that renders environment-style placeholders, used to
    /// show operators what will run.
    #[must_use]
    pub fn placeholders() -> Self {
        Self {
            owncloud_path: String::from("${OWNCLOUD_PATH}"),
            oauthname: String::from("${OAUTHNAME}"),
            client_id: String::from("${CLIENT_ID}"),
            client_secret: String::from("${CLIENT_SECRET}"),
            rds_domain: String::from("${RDS_DOMAIN}"),
        }
    }

    /// Substitutes every known `{placeholder}` in `template` in one pass.
    /// Unknown placeholders are left untouched.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            let (before, candidate) = rest.split_at(start);
            rendered.push_str(before);
            let Some(end) = candidate.find('}') else {
                rendered.push_str(candidate);
                return rendered;
            };
            let (placeholder, after) = candidate.split_at(end + 1);
            let key = placeholder.trim_start_matches('{').trim_end_matches('}');
            rendered.push_str(self.lookup(key).unwrap_or(placeholder));
            rest = after;
        }
        rendered.push_str(rest);
        rendered
    }

    /// Renders the full configuration sequence.
    #[must_use]
    pub fn command_sequence(&self) -> CommandSequence {
        CommandSequence(
            COMMAND_TEMPLATES
                .iter()
                .map(|template| self.render(template))
                .collect(),
        )
    }

    /// Renders the address discovery commands.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticCommands {
        DiagnosticCommands {
            hostname_probe: String::from(HOSTNAME_PROBE),
            override_scan: self.render(OVERRIDE_SCAN_TEMPLATE),
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "owncloud_path" => Some(&self.owncloud_path),
            "oauthname" => Some(&self.oauthname),
            "client_id" => Some(&self.client_id),
            "client_secret" => Some(&self.client_secret),
            "rds_domain" => Some(&self.rds_domain),
            _ => None,
        }
    }
}

/// Rendered configuration commands for one server, in execution order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSequence(Vec<String>);

impl CommandSequence {
    /// Returns the commands as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates over the commands in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of commands in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the sequence holds no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Commands used to discover an instance's public address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticCommands {
    /// Prints the system hostname.
    pub hostname_probe: String,
    /// Lists host override keys from the application configuration.
    pub override_scan: String,
}

/// Appends a trailing `/` to a non-empty install path.
///
/// An empty path means `occ` is found through `PATH` on the remote side.
#[must_use]
pub fn normalise_install_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.ends_with('/') {
        return trimmed.to_owned();
    }
    format!("{trimmed}/")
}

/// Renders the operator-facing overview printed by `get-commands`.
#[must_use]
pub fn overview() -> String {
    let context = CommandContext::placeholders();
    let mut text = String::from(CONDITIONS);
    text.push_str("\nCommands:\n");
    for command in context.command_sequence().iter() {
        text.push_str(command);
        text.push('\n');
    }
    text
}

/// Returns `command` in a form fit for logs.
///
/// The client registration carries the generated secret and is replaced
/// wholesale; every other command is returned unchanged.
#[must_use]
pub fn redact(command: &str) -> &str {
    if command.contains("oauth2:add-client") {
        "occ oauth2:add-client <redacted>"
    } else {
        command
    }
}

fn quote(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    escape(Cow::Borrowed(value)).into_owned()
}
