//! EC2 prefix list data source

use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::ec2::{
    DescribePrefixListsRequest, Filter, PrefixList, ERR_CODE_INVALID_PREFIX_LIST_ID_NOT_FOUND,
};
use crate::provider_data::{not_configured, AwsProviderData};

const READ_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Default)]
pub struct PrefixListDataSource {
    provider_data: Option<AwsProviderData>,
}

impl PrefixListDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory() -> Box<dyn DataSourceWithConfigure> {
        Box::new(Self::new())
    }
}

#[async_trait]
impl DataSource for PrefixListDataSource {
    fn type_name(&self) -> &str {
        "aws_prefix_list"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up a single AWS-managed or customer-managed prefix list")
            .attribute(
                AttributeBuilder::new("cidr_blocks", AttributeType::List(Box::new(AttributeType::String)))
                    .description("CIDR blocks in the prefix list")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the prefix list to select")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("prefix_list_id", AttributeType::String)
                    .description("ID of the prefix list to select")
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("filter", NestingMode::Set)
                    .description("Custom DescribePrefixLists filter")
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("values", AttributeType::List(Box::new(AttributeType::String)))
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![not_configured()],
            };
        };

        let input = describe_request(&request.config);
        tracing::debug!(?input, "reading EC2 prefix lists");

        let read_ctx = ctx.with_timeout(READ_TIMEOUT).await;
        let api = provider_data.client.ec2();
        let result = tokio::select! {
            _ = read_ctx.cancelled() => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error(
                        "reading EC2 Prefix List",
                        "timed out or cancelled while describing prefix lists",
                    )],
                };
            }
            result = api.describe_all_prefix_lists(&input) => result,
        };

        let prefix_lists = match result {
            Ok(lists) => lists,
            Err(e) if e.is_code(ERR_CODE_INVALID_PREFIX_LIST_ID_NOT_FOUND) => vec![],
            Err(e) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error("reading EC2 Prefix List", e.to_string())],
                }
            }
        };

        match single_prefix_list(prefix_lists) {
            Ok(prefix_list) => ReadDataSourceResponse {
                state: prefix_list_state(&request.config, &prefix_list),
                diagnostics: vec![],
            },
            Err(diagnostic) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![diagnostic],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PrefixListDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let (provider_data, diagnostics) = AwsProviderData::from_configure(request.provider_data);
        self.provider_data = provider_data;
        ConfigureDataSourceResponse { diagnostics }
    }
}

/// `name` becomes a `prefix-list-name` filter ahead of any custom filters
fn describe_request(config: &DynamicValue) -> DescribePrefixListsRequest {
    let mut input = DescribePrefixListsRequest::default();

    if let Some(name) = config
        .get_string_opt(&AttributePath::new("name"))
        .filter(|n| !n.is_empty())
    {
        input.filters.push(Filter::new("prefix-list-name", vec![name]));
    }

    if let Some(id) = config
        .get_string_opt(&AttributePath::new("prefix_list_id"))
        .filter(|id| !id.is_empty())
    {
        input.prefix_list_ids.push(id);
    }

    input.filters.extend(custom_filters(config));
    input
}

fn custom_filters(config: &DynamicValue) -> Vec<Filter> {
    let Ok(blocks) = config.get_list(&AttributePath::new("filter")) else {
        return vec![];
    };

    blocks
        .iter()
        .filter_map(|block| {
            let Dynamic::Map(fields) = block else {
                return None;
            };
            let name = fields.get("name")?.as_str()?.to_string();
            let values = match fields.get("values") {
                Some(Dynamic::List(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => vec![],
            };
            Some(Filter::new(&name, values))
        })
        .collect()
}

fn single_prefix_list(mut prefix_lists: Vec<PrefixList>) -> Result<PrefixList, Diagnostic> {
    match prefix_lists.len() {
        0 => Err(Diagnostic::error(
            "reading EC2 Prefix List",
            "no matching EC2 Prefix List found",
        )),
        1 => Ok(prefix_lists.remove(0)),
        _ => Err(Diagnostic::error(
            "reading EC2 Prefix List",
            "multiple EC2 Prefix Lists matched; use additional constraints to reduce matches to a single EC2 Prefix List",
        )),
    }
}

fn prefix_list_state(config: &DynamicValue, prefix_list: &PrefixList) -> DynamicValue {
    let mut state = config.clone();
    if state.is_null() {
        state = DynamicValue::object();
    }

    let _ = state.set_string(&AttributePath::new("id"), prefix_list.prefix_list_id.clone());
    let _ = state.set_string(&AttributePath::new("name"), prefix_list.prefix_list_name.clone());
    let _ = state.set_list(
        &AttributePath::new("cidr_blocks"),
        prefix_list
            .cidrs
            .iter()
            .map(|cidr| Dynamic::String(cidr.clone()))
            .collect(),
    );
    state
}
