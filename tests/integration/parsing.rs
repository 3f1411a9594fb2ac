//! Lexer and trace parser on a trace shaped like real solver output

use smtrace_core::{SmtraceError, TraceErrorKind};
use smtrace_lexer::{Lexer, Token};
use smtrace_trace::{ParseMode, TraceParser};

const TRACE: &str = "\
[tool-version] Z3 4.8.7
[mk-app] #1 Int
[mk-var] #2 0
[mk-app] #3 f #2
[mk-app] #4 <= #3 #2
[mk-quant] #5 mono 1 #3 #4
[attach-var-names] #5 (|x| ; |Int|)
[mk-app] #6 c
[mk-app] #7 f #6
[attach-enode] #7 0
[push] 0
[new-match] 0x7f01 #5 #3 #6 ; #7
[instance] 0x7f01 ; 1
[mk-app] #8 f #7
[attach-enode] #8 1
[end-of-instance]
[new-match] 0x7f02 #5 #3 #7 ; #8
[instance] 0x7f02 ; 2
[end-of-instance]
[pop] 1 1
[eof]
";

#[test]
fn test_every_line_lexes_to_a_tag() {
    for line in TRACE.lines() {
        let tokens = Lexer::new(line).tokenize();
        assert_eq!(tokens[0].token, Token::Tag, "{line}");
        assert!(tokens.iter().all(|t| t.token != Token::Error), "{line}");
    }
}

#[test]
fn test_instances_chain_through_produced_terms() {
    let summary = TraceParser::new().parse_str(TRACE, "mono.log").unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.instances, 2);
    assert_eq!(summary.dependency_edges, 1);
    let edge = summary.graph.edges[0];
    assert_eq!((edge.from, edge.to), (13, 18));
    assert_eq!(summary.quantifier_instances[0].name, "mono");
    assert_eq!(summary.quantifier_instances[0].instances, 2);
    assert!(summary.quantifier_instances[0].has_var_names);
    assert_eq!(summary.search_lines, 3);
    assert_eq!(summary.unknown_lines, 0);
}

#[test]
fn test_strict_and_lenient_agree_on_first_error() {
    let broken = TRACE.replace("[instance] 0x7f02 ; 2", "[instance] 0xdead ; 2");

    let err = TraceParser::new().parse_str(&broken, "mono.log").unwrap_err();
    let SmtraceError::Trace { kind, line, .. } = err else {
        panic!("expected a trace error");
    };
    assert_eq!(line, 18);
    assert!(matches!(kind, TraceErrorKind::UnknownFingerprint(_)));

    let summary = TraceParser::new()
        .with_mode(ParseMode::Lenient { max_errors: 10 })
        .parse_str(&broken, "mono.log")
        .unwrap();
    assert_eq!(summary.diagnostics[0].line, line);
}
