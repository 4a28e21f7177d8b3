//! JSON bridge used by editor integrations.
//!
//! A request names one operation on the command line and supplies its
//! input on standard input, terminated by an EOT byte (0x04). The answer is
//! a single JSON document on standard output.

use crate::{check_model, load_source, CliError, CliResult};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use verifpal_engine::{verify, VerifyConfig, VerifyResult};
use verifpal_model::{pretty_query, KnowledgeMap, Query, Value};

/// Terminates the input of every request.
pub const EOT: u8 = 0x04;

/// File name given to models that arrive over the bridge.
const BRIDGE_FILE_NAME: &str = "model.vp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Request {
    /// Model source to its knowledge map
    #[value(name = "knowledgeMap")]
    KnowledgeMap,
    /// Model source to the initial principal states
    #[value(name = "principalStates")]
    PrincipalStates,
    /// Value to its textual form
    #[value(name = "prettyValue")]
    PrettyValue,
    /// Query to its textual form
    #[value(name = "prettyQuery")]
    PrettyQuery,
    /// Model source to canonical model text
    #[value(name = "prettyPrint")]
    PrettyPrint,
    /// Model source to sequence-diagram text
    #[value(name = "prettyDiagram")]
    PrettyDiagram,
    /// Model source to verification results
    #[value(name = "verify")]
    Verify,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse<'a> {
    results: &'a [VerifyResult],
    results_code: &'a str,
}

/// Read everything up to the first EOT byte (or end of input), without it.
pub fn read_request_body(reader: impl Read) -> CliResult<String> {
    let mut buf = Vec::new();
    BufReader::new(reader)
        .read_until(EOT, &mut buf)
        .map_err(|e| CliError::IoError { message: e.to_string() })?;
    if buf.last() == Some(&EOT) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| CliError::JsonError { message: e.to_string() })
}

/// Answer `request` for `body`, returning the JSON text to print.
pub fn respond(request: Request, body: &str) -> CliResult<String> {
    let source = Arc::new(body.to_string());
    match request {
        Request::KnowledgeMap => {
            let model = load_source(source.clone(), BRIDGE_FILE_NAME)?;
            let km = KnowledgeMap::build(&model)
                .map_err(|e| CliError::from_model_error(e, source, BRIDGE_FILE_NAME))?;
            Ok(serde_json::to_string(&km)?)
        }
        Request::PrincipalStates => {
            let model = load_source(source.clone(), BRIDGE_FILE_NAME)?;
            let (_, states) = check_model(&model, source, BRIDGE_FILE_NAME)?;
            Ok(serde_json::to_string(&states)?)
        }
        Request::PrettyValue => {
            let value: Value = serde_json::from_str(body)?;
            Ok(serde_json::to_string(&value.to_string())?)
        }
        Request::PrettyQuery => {
            let query: Query = serde_json::from_str(body)?;
            Ok(serde_json::to_string(&pretty_query(&query))?)
        }
        Request::PrettyPrint => {
            let ast = verifpal_syntax::parse(body)
                .map_err(|e| CliError::from_parse_error(e, source, BRIDGE_FILE_NAME))?;
            Ok(serde_json::to_string(&verifpal_syntax::pretty_print(&ast))?)
        }
        Request::PrettyDiagram => {
            let ast = verifpal_syntax::parse(body)
                .map_err(|e| CliError::from_parse_error(e, source, BRIDGE_FILE_NAME))?;
            Ok(serde_json::to_string(&verifpal_syntax::pretty_diagram(&ast))?)
        }
        Request::Verify => {
            let model = load_source(source, BRIDGE_FILE_NAME)?;
            let outcome = verify(&model, &VerifyConfig::default())?;
            Ok(serde_json::to_string(&VerifyResponse {
                results: &outcome.results,
                results_code: &outcome.code,
            })?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "attacker[passive]
principal Alice[
    generates a
]
Alice -> Bob: a
principal Bob[]
queries[confidentiality? a]";

    #[test]
    fn test_body_stops_at_eot() {
        let input = b"{\"x\": 1}\x04trailing".as_slice();
        assert_eq!(read_request_body(input).unwrap(), "{\"x\": 1}");
        assert_eq!(read_request_body(b"plain".as_slice()).unwrap(), "plain");
    }

    #[test]
    fn test_knowledge_map() {
        let json: serde_json::Value = serde_json::from_str(&respond(Request::KnowledgeMap, MODEL).unwrap()).unwrap();
        let principals = json["principals"].as_array().unwrap();
        assert_eq!(principals[0], "Attacker");
        assert!(principals.iter().any(|p| p == "Alice"));
    }

    #[test]
    fn test_pretty_value_round_trip() {
        let value = Value::nil();
        let body = serde_json::to_string(&value).unwrap();
        assert_eq!(respond(Request::PrettyValue, &body).unwrap(), "\"nil\"");
    }

    #[test]
    fn test_pretty_diagram() {
        let text: String = serde_json::from_str(&respond(Request::PrettyDiagram, MODEL).unwrap()).unwrap();
        assert!(text.contains("Note over Alice:"));
        assert!(text.contains("Alice->Bob: a"));
    }

    #[test]
    fn test_verify() {
        let json: serde_json::Value = serde_json::from_str(&respond(Request::Verify, MODEL).unwrap()).unwrap();
        assert_eq!(json["resultsCode"], "c1");
        assert_eq!(json["results"][0]["resolved"], true);
    }

    #[test]
    fn test_malformed_request() {
        assert!(matches!(
            respond(Request::PrettyValue, "not json"),
            Err(CliError::JsonError { .. })
        ));
    }
}
