use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

pub const AZURE_PUBLIC: &str = "AzureCloud";
pub const AZURE_CHINA: &str = "AzureChinaCloud";
pub const AZURE_US_GOVERNMENT: &str = "AzureUSGovernment";

/// Authority and resource endpoints of one cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSettings {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub aad_authority: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudInfo {
    pub name: String,
    pub display_name: String,
}

fn cloud(name: &str, display_name: &str, authority: &str, props: &[(&str, &str)]) -> CloudSettings {
    CloudSettings {
        name: name.to_owned(),
        display_name: display_name.to_owned(),
        aad_authority: authority.to_owned(),
        properties: props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

static PREDEFINED_CLOUDS: LazyLock<Vec<CloudSettings>> = LazyLock::new(|| {
    vec![
        cloud(
            AZURE_PUBLIC,
            "Azure",
            "https://login.microsoftonline.com/",
            &[
                ("azureDataExplorerSuffix", ".kusto.windows.net"),
                ("logAnalytics", "https://api.loganalytics.io"),
                ("portal", "https://portal.azure.com"),
                ("prometheusResourceId", "https://prometheus.monitor.azure.com"),
                ("resourceManager", "https://management.azure.com"),
            ],
        ),
        cloud(
            AZURE_CHINA,
            "Azure China",
            "https://login.chinacloudapi.cn/",
            &[
                ("azureDataExplorerSuffix", ".kusto.chinacloudapi.cn"),
                ("logAnalytics", "https://api.loganalytics.azure.cn"),
                ("portal", "https://portal.azure.cn"),
                ("prometheusResourceId", "https://prometheus.monitor.azure.cn"),
                ("resourceManager", "https://management.chinacloudapi.cn"),
            ],
        ),
        cloud(
            AZURE_US_GOVERNMENT,
            "Azure US Government",
            "https://login.microsoftonline.us/",
            &[
                ("azureDataExplorerSuffix", ".kusto.usgovcloudapi.net"),
                ("logAnalytics", "https://api.loganalytics.us"),
                ("portal", "https://portal.azure.us"),
                ("prometheusResourceId", "https://prometheus.monitor.azure.us"),
                ("resourceManager", "https://management.usgovcloudapi.net"),
            ],
        ),
    ]
});

pub fn predefined_clouds() -> &'static [CloudSettings] {
    PREDEFINED_CLOUDS.as_slice()
}

/// Maps the common aliases of the built-in clouds onto their canonical names.
/// Unknown names are returned unchanged.
pub fn normalize_cloud_name(cloud_name: &str) -> String {
    match cloud_name.to_lowercase().as_str() {
        "azurecloud" | "azurepublic" | "azurepubliccloud" | "public" => AZURE_PUBLIC.to_owned(),
        "azurechina" | "azurechinacloud" | "china" => AZURE_CHINA.to_owned(),
        "azureusgovernment" | "azureusgovernmentcloud" | "usgov" | "usgovernment" => {
            AZURE_US_GOVERNMENT.to_owned()
        }
        _ => cloud_name.to_owned(),
    }
}

/// Built-in clouds followed by the custom ones; first name match wins.
pub fn lookup_cloud<'a>(custom: &'a [CloudSettings], cloud_name: &str) -> Option<&'a CloudSettings> {
    predefined_clouds()
        .iter()
        .chain(custom.iter())
        .find(|c| c.name == cloud_name)
}

pub fn cloud_infos<'a>(clouds: impl Iterator<Item = &'a CloudSettings>) -> Vec<CloudInfo> {
    clouds
        .map(|c| CloudInfo {
            name: c.name.to_owned(),
            display_name: c.display_name.to_owned(),
        })
        .collect()
}
