//! Declarative table of every proxied spending endpoint.
//!
//! Each row names the local route (relative to `/api/v1/spending/`), the
//! upstream path template, how inbound parameters are shaped, and which
//! fields must be present before any outbound call is made. Routes mirror the
//! upstream paths; `{name}` segments are path parameters.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method { Get, Post }

/// Value used when the caller omits a whitelisted parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    EmptyObject,
    EmptyList,
}

impl DefaultValue {
    pub fn to_json(self) -> Value {
        match self {
            DefaultValue::Str(s) => json!(s),
            DefaultValue::Int(n) => json!(n),
            DefaultValue::EmptyObject => json!({}),
            DefaultValue::EmptyList => json!([]),
        }
    }

    /// Rendering for a query string; empty containers have no query form.
    pub fn to_query(self) -> Option<String> {
        match self {
            DefaultValue::Str(s) => Some(s.to_string()),
            DefaultValue::Int(n) => Some(n.to_string()),
            DefaultValue::EmptyObject | DefaultValue::EmptyList => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub default: Option<DefaultValue>,
    /// Forwarded as a repeated query key.
    pub list: bool,
}

const fn p(name: &'static str) -> Param { Param { name, default: None, list: false } }
const fn s(name: &'static str, v: &'static str) -> Param { Param { name, default: Some(DefaultValue::Str(v)), list: false } }
const fn n(name: &'static str, v: i64) -> Param { Param { name, default: Some(DefaultValue::Int(v)), list: false } }
const fn obj(name: &'static str) -> Param { Param { name, default: Some(DefaultValue::EmptyObject), list: false } }
const fn arr(name: &'static str) -> Param { Param { name, default: Some(DefaultValue::EmptyList), list: false } }
const fn many(name: &'static str) -> Param { Param { name, default: None, list: true } }

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamMode {
    /// Nothing from the request is forwarded.
    None,
    /// GET: whitelisted query parameters.
    Query(&'static [Param]),
    /// POST: whitelisted body fields.
    Body(&'static [Param]),
    /// POST: the JSON body is forwarded verbatim.
    Passthrough,
}

/// A field that must be supplied. Dotted names address nested objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Required {
    /// The key exists (any value, including null).
    Present(&'static str),
    /// The key exists and its value is not null, "", [], {}, 0 or false.
    NonBlank(&'static str),
}

impl Required {
    pub fn field(&self) -> &'static str {
        match self { Required::Present(f) | Required::NonBlank(f) => f }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: Method,
    pub route: &'static str,
    pub upstream: &'static str,
    pub params: ParamMode,
    pub required: &'static [Required],
    /// Upstream 404 becomes a local 404 instead of a generic failure.
    pub relay_not_found: bool,
}

impl Endpoint {
    const fn new(name: &'static str, method: Method, route: &'static str, params: ParamMode) -> Self {
        Endpoint { name, method, route, upstream: route, params, required: &[], relay_not_found: false }
    }
    const fn upstream(self, upstream: &'static str) -> Self { Endpoint { upstream, ..self } }
    const fn requires(self, required: &'static [Required]) -> Self { Endpoint { required, ..self } }
    const fn relay_not_found(self) -> Self { Endpoint { relay_not_found: true, ..self } }

    /// Names of `{param}` segments in the route, in order.
    pub fn path_params(&self) -> Vec<&'static str> {
        self.route.split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
            .collect()
    }
}

const fn get(name: &'static str, route: &'static str, params: ParamMode) -> Endpoint { Endpoint::new(name, Method::Get, route, params) }
const fn post(name: &'static str, route: &'static str, params: ParamMode) -> Endpoint { Endpoint::new(name, Method::Post, route, params) }

use ParamMode::{Body, Passthrough, Query};
use Required::{NonBlank, Present};

const FY: &[Param] = &[p("fiscal_year")];
const FY_AWARDING: &[Param] = &[p("fiscal_year"), s("agency_type", "awarding")];
const AGENCY_AWARDS: &[Param] = &[p("fiscal_year"), p("agency_type"), p("award_type_codes")];
const OBLIGATED_PAGE: &[Param] = &[
    p("fiscal_year"), p("filter"), s("order", "desc"), s("sort", "obligated_amount"), n("page", 1), n("limit", 10),
];
const SUB_COMPONENTS: &[Param] = &[
    p("fiscal_year"), s("agency_type", "awarding"), s("order", "desc"), s("sort", "total_budgetary_resources"), n("page", 1), n("limit", 10),
];
const AWARDS_COUNT: &[Param] = &[
    p("fiscal_year"), s("group", "all"), s("order", "desc"), s("sort", "awarding_toptier_agency_name.keyword"), n("page", 1), n("limit", 10),
];
const SUB_AGENCY: &[Param] = &[
    p("fiscal_year"), many("award_type_codes"), s("agency_type", "awarding"), s("order", "desc"), s("sort", "total_obligations"), n("page", 1), n("limit", 10),
];
const CITY: &[Param] = &[p("search_text"), p("limit"), p("filter")];
const RECIPIENT: &[Param] = &[p("search_text"), n("limit", 10), arr("recipient_levels")];
const AWARD_SPENDING: &[Param] = &[p("awarding_agency_id"), p("fiscal_year"), n("limit", 10), n("page", 1)];
const AWARD_ACCOUNTS: &[Param] = &[p("award_id"), n("page", 1), n("limit", 10), s("order", "desc"), s("sort", "federal_account")];
const SUBFUNCTIONS: &[Param] = &[p("budget_function")];
const FILE_NAME: &[Param] = &[p("file_name")];
const SEARCH_TEXT: &[Param] = &[p("search_text"), n("limit", 10)];
const ACCOUNT_FILTERS: &[Param] = &[obj("filters"), n("limit", 10)];
const DEF_CODES: &[Required] = &[Present("filter.def_codes")];
const NEEDS_SEARCH_TEXT: &[Required] = &[NonBlank("search_text")];

pub static ENDPOINTS: &[Endpoint] = &[
    // agency
    get("agency_overview", "agency/{toptier_code}/", Query(FY)),
    get("agency_awards", "agency/{toptier_code}/awards/", Query(AGENCY_AWARDS)),
    get("agency_new_awards_count", "agency/{toptier_code}/awards/new/count/", Query(AGENCY_AWARDS)),
    get("agency_awards_count", "agency/awards/count/", Query(AWARDS_COUNT)),
    get("agency_budget_function", "agency/{toptier_code}/budget_function/", Query(OBLIGATED_PAGE)),
    get("agency_budget_function_count", "agency/{toptier_code}/budget_function/count/", Query(FY)),
    get("agency_budgetary_resources", "agency/{toptier_code}/budgetary_resources/", ParamMode::None),
    get("agency_federal_account", "agency/{toptier_code}/federal_account/", Query(OBLIGATED_PAGE)),
    get("agency_federal_account_count", "agency/{toptier_code}/federal_account/count/", Query(FY)),
    get("agency_object_class", "agency/{toptier_code}/object_class/", Query(OBLIGATED_PAGE)),
    get("agency_object_class_count", "agency/{toptier_code}/object_class/count/", Query(FY)),
    get("agency_obligations_by_award_category", "agency/{toptier_code}/obligations_by_award_category/", Query(FY)),
    get("agency_program_activity", "agency/{toptier_code}/program_activity/", Query(OBLIGATED_PAGE)),
    get("agency_program_activity_count", "agency/{toptier_code}/program_activity/count/", Query(FY)),
    get("agency_sub_agency", "agency/{toptier_code}/sub_agency/", Query(SUB_AGENCY)),
    get("agency_sub_agency_count", "agency/{toptier_code}/sub_agency/count/", Query(FY_AWARDING)),
    get("agency_sub_components", "agency/{toptier_code}/sub_components/", Query(SUB_COMPONENTS)),
    get("agency_sub_component_bureau", "agency/{toptier_code}/sub_components/{bureau_slug}/", Query(SUB_COMPONENTS)),
    get("treasury_account_object_class", "agency/treasury_account/{tas}/object_class/", Query(OBLIGATED_PAGE)),
    get("treasury_account_program_activity", "agency/treasury_account/{tas}/program_activity/", Query(OBLIGATED_PAGE)),
    // autocomplete
    post("autocomplete_accounts_a", "autocomplete/accounts/a/", Body(ACCOUNT_FILTERS)),
    post("autocomplete_accounts_aid", "autocomplete/accounts/aid/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.aid")]),
    post("autocomplete_accounts_ata", "autocomplete/accounts/ata/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.ata")]),
    post("autocomplete_accounts_bpoa", "autocomplete/accounts/bpoa/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.bpoa")]),
    post("autocomplete_accounts_epoa", "autocomplete/accounts/epoa/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.epoa")]),
    post("autocomplete_accounts_main", "autocomplete/accounts/main/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.main")]),
    post("autocomplete_accounts_sub", "autocomplete/accounts/sub/", Body(ACCOUNT_FILTERS)).requires(&[Present("filters.sub")]),
    post("autocomplete_awarding_agency", "autocomplete/awarding_agency/", Body(SEARCH_TEXT)).requires(NEEDS_SEARCH_TEXT),
    post("autocomplete_awarding_agency_office", "autocomplete/awarding_agency_office/", Body(SEARCH_TEXT)).requires(NEEDS_SEARCH_TEXT),
    post("autocomplete_funding_agency_office", "autocomplete/funding_agency_office/", Body(SEARCH_TEXT)).requires(NEEDS_SEARCH_TEXT),
    post("autocomplete_cfda", "autocomplete/cfda/", Body(SEARCH_TEXT)).requires(NEEDS_SEARCH_TEXT),
    post("autocomplete_city", "autocomplete/city/", Body(CITY)).requires(&[
        NonBlank("search_text"), NonBlank("limit"), NonBlank("filter.country_code"), NonBlank("filter.scope"),
    ]),
    post("autocomplete_recipient", "autocomplete/recipient/", Body(RECIPIENT))
        .requires(NEEDS_SEARCH_TEXT),
    // awards
    get("award_spending_recipient", "award_spending/recipient/", Query(AWARD_SPENDING)).requires(&[NonBlank("awarding_agency_id"), NonBlank("fiscal_year")]),
    get("award", "awards/{award_id}/", ParamMode::None),
    post("award_accounts", "awards/accounts/", Body(AWARD_ACCOUNTS)).requires(&[Present("award_id")]),
    get("award_federal_account_count", "awards/count/federal_account/{award_id}/", ParamMode::None),
    get("award_subaward_count", "awards/count/subaward/{award_id}/", ParamMode::None),
    get("award_transaction_count", "awards/count/transaction/{award_id}/", ParamMode::None),
    post("award_funding", "awards/funding/", Passthrough),
    post("award_funding_rollup", "awards/funding_rollup/", Passthrough),
    get("awards_last_updated", "awards/last_updated/", ParamMode::None),
    // budget functions
    get("list_budget_functions", "budget_functions/list_budget_functions/", ParamMode::None),
    post("list_budget_subfunctions", "budget_functions/list_budget_subfunctions/", Body(SUBFUNCTIONS)),
    // bulk download
    post("bulk_download_awards", "bulk_download/awards/", Passthrough),
    post("bulk_download_list_agencies", "bulk_download/list_agencies/", Passthrough),
    post("bulk_download_list_monthly_files", "bulk_download/list_monthly_files/", Passthrough),
    get("download_status", "download/status/", Query(FILE_NAME))
        .upstream("download/status")
        .requires(&[NonBlank("file_name")])
        .relay_not_found(),
    // disaster
    post("disaster_agency_count", "disaster/agency/count/", Passthrough).requires(DEF_CODES),
    post("disaster_agency_loans", "disaster/agency/loans/", Passthrough).requires(DEF_CODES),
    post("disaster_agency_spending", "disaster/agency/spending/", Passthrough).requires(DEF_CODES),
    post("disaster_award_amount", "disaster/award/amount/", Passthrough).requires(DEF_CODES),
    post("disaster_award_count", "disaster/award/count/", Passthrough).requires(DEF_CODES),
    post("disaster_cfda_count", "disaster/cfda/count/", Passthrough).requires(DEF_CODES),
    post("disaster_cfda_loans", "disaster/cfda/loans/", Passthrough).requires(DEF_CODES),
    post("disaster_cfda_spending", "disaster/cfda/spending/", Passthrough).requires(DEF_CODES),
    post("disaster_def_code_count", "disaster/def_code/count/", Passthrough).requires(DEF_CODES),
    post("disaster_federal_account_count", "disaster/federal_account/count/", Passthrough).requires(DEF_CODES),
    post("disaster_federal_account_loans", "disaster/federal_account/loans/", Passthrough).requires(DEF_CODES),
    post("disaster_federal_account_spending", "disaster/federal_account/spending/", Passthrough).requires(DEF_CODES),
    post("disaster_object_class_count", "disaster/object_class/count/", Passthrough).requires(DEF_CODES),
    post("disaster_object_class_loans", "disaster/object_class/loans/", Passthrough).requires(DEF_CODES),
    post("disaster_object_class_spending", "disaster/object_class/spending/", Passthrough).requires(DEF_CODES),
    post("disaster_recipient_count", "disaster/recipient/count/", Passthrough).requires(DEF_CODES),
    post("disaster_recipient_loans", "disaster/recipient/loans/", Passthrough).requires(DEF_CODES),
    post("disaster_recipient_spending", "disaster/recipient/spending/", Passthrough).requires(DEF_CODES),
    post("disaster_spending_by_geography", "disaster/spending_by_geography/", Passthrough).requires(DEF_CODES),
];

pub fn find(name: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|e| e.name == name)
}
