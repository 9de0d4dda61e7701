//! Pattern tables for sources, sinks, and sanitizers.
//!
//! Pure configuration data: the known sanitizer names, HTML-rendering sink
//! names, request-source shapes, safe structured-response constructors, and
//! cast-clean coercions the analyzer matches against. Loaded once at first
//! use and never mutated afterwards; the analyzer receives a shared
//! reference.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Immutable pattern tables consulted during analysis.
#[derive(Debug)]
pub struct PatternTables {
    /// Dotted names of calls known to neutralize HTML-injection risk
    pub sanitizers: HashSet<&'static str>,
    /// Bare names of coercions treated as sanitizing (narrow scalar output)
    pub cast_clean: HashSet<&'static str>,
    /// Dotted names of HTML-rendering output operations
    pub sinks: HashSet<&'static str>,
    /// Structured-response constructors that are safe regardless of taint
    pub safe_json_responses: HashSet<&'static str>,
    /// Lower-cased dotted prefixes marking an attribute chain as request data
    pub request_attr_prefixes: &'static [&'static str],
    /// Lower-cased dotted prefixes marking a call as a request-data accessor
    pub source_call_prefixes: &'static [&'static str],
    /// Suffixes qualifying a `.request.` chain as a request-data accessor
    pub request_chain_suffixes: &'static [&'static str],
    /// Decorator name suffixes that mark a function as a routing handler
    pub endpoint_markers: &'static [&'static str],
}

impl PatternTables {
    /// The built-in tables, constructed once per process.
    #[must_use]
    pub fn builtin() -> &'static PatternTables {
        static TABLES: OnceLock<PatternTables> = OnceLock::new();
        TABLES.get_or_init(|| PatternTables {
            sanitizers: [
                "html.escape",
                "markupsafe.escape",
                "bleach.clean",
                "django.utils.html.escape",
                "django.utils.html.format_html",
                "flask.escape",
            ]
            .into_iter()
            .collect(),
            cast_clean: ["int"].into_iter().collect(),
            sinks: [
                "render_template",
                "render_template_string",
                "flask.render_template",
                "flask.render_template_string",
                "Response",
                "flask.Response",
                "make_response",
                "flask.make_response",
                "Markup",
                "markupsafe.Markup",
                "render",
                "django.shortcuts.render",
                "HttpResponse",
                "django.http.HttpResponse",
                "HttpResponseBadRequest",
                "HttpResponseNotFound",
                "HttpResponseForbidden",
                "HttpResponseRedirect",
                "TemplateResponse",
                "Jinja2Templates.TemplateResponse",
                "templates.TemplateResponse",
                "HTMLResponse",
                "fastapi.responses.HTMLResponse",
                "PlainTextResponse",
                "fastapi.responses.PlainTextResponse",
            ]
            .into_iter()
            .collect(),
            safe_json_responses: [
                "jsonify",
                "flask.jsonify",
                "JSONResponse",
                "fastapi.responses.JSONResponse",
                "ORJSONResponse",
                "fastapi.responses.ORJSONResponse",
                "UJSONResponse",
                "fastapi.responses.UJSONResponse",
            ]
            .into_iter()
            .collect(),
            request_attr_prefixes: &[
                "request.args",
                "request.form",
                "request.values",
                "request.json",
                "request.data",
                "request.body",
                "request.headers",
                "request.cookies",
                "request.get",
                "request.get_data",
                "request.meta",
                "request.query_params",
                "request.path_params",
                "request.post",
            ],
            source_call_prefixes: &[
                "request.args",
                "request.form",
                "request.values",
                "request.get_json",
                "request.json",
                "request.data",
                "request.get_data",
                "request.body",
                "request.stream",
                "request.headers",
                "request.cookies",
                "request.get",
                "request.post",
                "request.meta",
                "request.query_params",
                "request.path_params",
            ],
            request_chain_suffixes: &[
                "args", "form", "values", "get_json", "json", "headers", "cookies", "meta", "get",
            ],
            endpoint_markers: &[
                "route", "get", "post", "put", "delete", "patch", "options", "api_view",
            ],
        })
    }

    /// Does a dotted attribute chain read request-controlled data?
    /// Case-insensitive prefix match, plus any chain routed through a
    /// `.request.` segment.
    #[must_use]
    pub fn is_request_attribute(&self, chain: &str) -> bool {
        let lower = chain.to_lowercase();
        self.request_attr_prefixes
            .iter()
            .any(|prefix| lower.starts_with(prefix))
            || lower.contains(".request.")
    }

    /// Is a resolved call name a source of external input?
    #[must_use]
    pub fn is_source_call(&self, name: &str) -> bool {
        if name == "input" {
            return true;
        }
        let lower = name.to_lowercase();
        if self
            .source_call_prefixes
            .iter()
            .any(|prefix| lower.starts_with(prefix))
        {
            return true;
        }
        if lower.contains(".request.") {
            return self
                .request_chain_suffixes
                .iter()
                .any(|suffix| lower.contains(suffix));
        }
        false
    }

    /// Does a decorator name register the function as a routing handler?
    #[must_use]
    pub fn is_endpoint_marker(&self, decorator: &str) -> bool {
        let lower = decorator.to_lowercase();
        self.endpoint_markers
            .iter()
            .any(|marker| lower.ends_with(marker))
    }

    /// Is a resolved call name an HTML-rendering sink? Matches the explicit
    /// table plus any lower-cased name ending in "response" or "render".
    #[must_use]
    pub fn is_sink_call(&self, name: &str) -> bool {
        if self.sinks.contains(name) {
            return true;
        }
        let lower = name.to_lowercase();
        lower.ends_with("response") || lower.ends_with("render")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_populated() {
        let tables = PatternTables::builtin();
        assert!(tables.sanitizers.contains("html.escape"));
        assert!(tables.cast_clean.contains("int"));
        assert!(tables.sinks.contains("render_template_string"));
        assert!(tables.safe_json_responses.contains("jsonify"));
    }

    #[test]
    fn test_request_attribute_prefixes() {
        let tables = PatternTables::builtin();
        assert!(tables.is_request_attribute("request.args"));
        assert!(tables.is_request_attribute("request.args.get"));
        assert!(tables.is_request_attribute("request.GET"));
        assert!(tables.is_request_attribute("request.COOKIES"));
        assert!(tables.is_request_attribute("self.request.args"));
        assert!(!tables.is_request_attribute("response.args"));
        assert!(!tables.is_request_attribute(""));
    }

    #[test]
    fn test_source_calls() {
        let tables = PatternTables::builtin();
        assert!(tables.is_source_call("input"));
        assert!(tables.is_source_call("request.args.get"));
        assert!(tables.is_source_call("request.get_json"));
        assert!(tables.is_source_call("request.cookies.get"));
        assert!(tables.is_source_call("self.request.args.get"));
        assert!(!tables.is_source_call("html.escape"));
        assert!(!tables.is_source_call(""));
    }

    #[test]
    fn test_endpoint_markers() {
        let tables = PatternTables::builtin();
        assert!(tables.is_endpoint_marker("app.route"));
        assert!(tables.is_endpoint_marker("router.get"));
        assert!(tables.is_endpoint_marker("api_view"));
        assert!(!tables.is_endpoint_marker("staticmethod"));
    }

    #[test]
    fn test_sink_name_suffixes() {
        let tables = PatternTables::builtin();
        assert!(tables.is_sink_call("render_template_string"));
        assert!(tables.is_sink_call("MyCustomResponse"));
        assert!(tables.is_sink_call("custom_render"));
        assert!(!tables.is_sink_call("jsonify"));
        assert!(!tables.is_sink_call("print"));
    }
}
