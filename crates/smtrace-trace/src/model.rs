//! Incremental model of a Z3 trace: terms, quantifiers, pending matches and
//! the stack of open instances. One handler per line kind.

use crate::cursor::{Cursor, LineError, LineResult};
use crate::summary::{
    DependencyKind, InstanceEdge, InstanceNode, InstantiationGraph, QuantifierCount, VersionInfo,
};
use smtrace_core::TraceErrorKind;
use smtrace_lexer::{SpannedToken, Token};
use std::collections::HashMap;

/// Lines produced by the SAT/SMT search loop; counted, not interpreted
const SEARCH_TAGS: &[&str] = &[
    "[push]",
    "[pop]",
    "[begin-check]",
    "[assign]",
    "[conflict]",
    "[decide-and-or]",
    "[resolve-lit]",
    "[resolve-process]",
    "[eof]",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermKind {
    App,
    Proof,
    Var,
    Quant(usize),
}

/// Why a term is equal to another one, from `[eq-expl]`
#[derive(Debug, Clone, PartialEq, Eq)]
enum EqualityExpl {
    Root,
    /// Equal because the literal term `eq` was asserted
    Literal { eq: usize, to: usize },
    /// Congruence, theory or axiom explanations
    Other { to: usize },
}

#[derive(Debug, Clone)]
struct Term {
    kind: TermKind,
    /// Instance that produced this term, if any
    resp_inst: Option<usize>,
    equality_expls: Vec<EqualityExpl>,
}

#[derive(Debug, Clone)]
struct Quantifier {
    name: String,
    num_vars: usize,
    discovered: bool,
    has_var_names: bool,
    instances: usize,
}

/// A blamed term produced by an earlier instance
#[derive(Debug, Clone, Copy)]
struct Dependency {
    from: usize,
    kind: DependencyKind,
}

#[derive(Debug, Clone)]
struct PendingMatch {
    quant: usize,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone)]
struct Instance {
    line: usize,
    quant: usize,
    /// Moved into `TraceModel::edges` when the instance is closed
    dependencies: Vec<Dependency>,
}

/// What a line contributed, used for summary counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Term,
    Quantifier,
    Match,
    DiscoveredMatch,
    Instance,
    EndOfInstance,
    Attachment,
    Version,
    Search,
    Unknown,
}

#[derive(Debug, Default)]
pub struct TraceModel {
    version: Option<VersionInfo>,
    term_map: HashMap<String, usize>,
    terms: Vec<Term>,
    quantifiers: Vec<Quantifier>,
    discovered: HashMap<String, usize>,
    matches: HashMap<String, PendingMatch>,
    instances: Vec<Instance>,
    /// Open instances, innermost last
    inst_stack: Vec<usize>,
    /// `(producer, consumer, kind)` for every closed consumer
    edges: Vec<(usize, usize, DependencyKind)>,
    max_depth: usize,
}

impl TraceModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one non-empty, lexed line; `line_no` identifies instances in
    /// the instantiation graph
    ///
    /// # Errors
    ///
    /// Returns the first malformed or inconsistent token of the line
    pub fn apply(
        &mut self,
        line_no: usize,
        input: &str,
        tokens: &[SpannedToken<'_>],
    ) -> LineResult<LineKind> {
        let mut cur = Cursor::new(input, tokens);
        let tag = cur.expect(Token::Tag, "line tag")?;

        let kind = match tag.text {
            "[tool-version]" => self.tool_version(&mut cur).map(|()| LineKind::Version),
            "[mk-app]" => self.mk_app(&mut cur, TermKind::App).map(|()| LineKind::Term),
            "[mk-proof]" => self.mk_app(&mut cur, TermKind::Proof).map(|()| LineKind::Term),
            "[mk-var]" => self.mk_var(&mut cur).map(|()| LineKind::Term),
            "[mk-quant]" | "[mk-lambda]" => {
                self.mk_quant(&mut cur).map(|()| LineKind::Quantifier)
            }
            "[attach-var-names]" => self.attach_var_names(&mut cur).map(|()| LineKind::Attachment),
            "[attach-meaning]" => self.attach_meaning(&mut cur).map(|()| LineKind::Attachment),
            "[attach-enode]" => self.attach_enode(&mut cur).map(|()| LineKind::Attachment),
            "[eq-expl]" => self.eq_expl(&mut cur).map(|()| LineKind::Attachment),
            "[new-match]" => self.new_match(&mut cur).map(|()| LineKind::Match),
            "[inst-discovered]" => self
                .inst_discovered(&mut cur)
                .map(|()| LineKind::DiscoveredMatch),
            "[instance]" => self.instance(&mut cur, line_no).map(|()| LineKind::Instance),
            "[end-of-instance]" => self.end_of_instance(tag).map(|()| LineKind::EndOfInstance),
            search if SEARCH_TAGS.contains(&search) => {
                cur.skip_rest();
                Ok(LineKind::Search)
            }
            _ => {
                cur.skip_rest();
                Ok(LineKind::Unknown)
            }
        }?;
        cur.finish()?;
        Ok(kind)
    }

    fn tool_version(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let solver = cur.symbol("solver name")?.to_string();
        let tok = cur.expect(Token::Word, "solver version")?;
        let version = semver::Version::parse(tok.text).map_err(|_| {
            LineError::new(TraceErrorKind::InvalidVersion(tok.text.to_string()), tok.span)
        })?;
        tracing::debug!("trace produced by {solver} {version}");
        self.version = Some(VersionInfo { solver, version });
        Ok(())
    }

    fn new_term(&mut self, id: &str, kind: TermKind) {
        let idx = self.terms.len();
        self.terms.push(Term {
            kind,
            resp_inst: None,
            equality_expls: Vec::new(),
        });
        // Ids may be reused; later uses refer to the newest term.
        self.term_map.insert(id.to_string(), idx);
    }

    fn existing_term(&self, tok: SpannedToken<'_>) -> LineResult<usize> {
        self.term_map.get(tok.text).copied().ok_or_else(|| {
            LineError::new(TraceErrorKind::UnknownTerm(tok.text.to_string()), tok.span)
        })
    }

    fn term_ref(&self, cur: &mut Cursor<'_, '_>, what: &'static str) -> LineResult<usize> {
        let tok = cur.expect(Token::TermId, what)?;
        self.existing_term(tok)
    }

    fn quant_ref(&self, cur: &mut Cursor<'_, '_>) -> LineResult<usize> {
        let tok = cur.expect(Token::TermId, "quantifier id")?;
        let idx = self.existing_term(tok)?;
        match self.terms[idx].kind {
            TermKind::Quant(q) => Ok(q),
            _ => Err(LineError::new(
                TraceErrorKind::NotAQuantifier(tok.text.to_string()),
                tok.span,
            )),
        }
    }

    /// Known term ids until end of line or `;` (the `;` is consumed)
    fn term_list(&self, cur: &mut Cursor<'_, '_>) -> LineResult<Vec<usize>> {
        let mut ids = Vec::new();
        while !cur.at_end() {
            if cur.eat(Token::Semicolon).is_some() {
                break;
            }
            ids.push(self.term_ref(cur, "term id")?);
        }
        Ok(ids)
    }

    fn mk_app(&mut self, cur: &mut Cursor<'_, '_>, kind: TermKind) -> LineResult<()> {
        let id = cur.expect(Token::TermId, "term id")?;
        cur.symbol("function name")?;
        while !cur.at_end() {
            self.term_ref(cur, "child term id")?;
        }
        self.new_term(id.text, kind);
        Ok(())
    }

    fn mk_var(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let id = cur.expect(Token::TermId, "term id")?;
        cur.number("variable index")?;
        self.new_term(id.text, TermKind::Var);
        Ok(())
    }

    fn mk_quant(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let id = cur.expect(Token::TermId, "quantifier id")?;
        let name = cur.symbol("quantifier name")?.to_string();
        let num_vars = cur.number("variable count")?;
        let mut children = 0usize;
        while !cur.at_end() {
            self.term_ref(cur, "child term id")?;
            children += 1;
        }
        if children == 0 {
            return Err(LineError::new(
                TraceErrorKind::EmptyQuantifier(id.text.to_string()),
                id.span,
            ));
        }
        let qidx = self.quantifiers.len();
        self.quantifiers.push(Quantifier {
            name,
            num_vars,
            discovered: false,
            has_var_names: false,
            instances: 0,
        });
        self.new_term(id.text, TermKind::Quant(qidx));
        Ok(())
    }

    fn attach_var_names(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let qidx = self.quant_ref(cur)?;
        // (name ; sort) tuples; both halves may be quoted or empty
        while !cur.at_end() {
            cur.expect(Token::LParen, "`(`")?;
            while !cur.peek_is(Token::RParen) {
                if cur.eat(Token::Semicolon).is_none() {
                    cur.symbol("variable name or sort")?;
                }
            }
            cur.expect(Token::RParen, "`)`")?;
        }
        self.quantifiers[qidx].has_var_names = true;
        Ok(())
    }

    fn attach_meaning(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        self.term_ref(cur, "term id")?;
        cur.symbol("theory")?;
        if cur.at_end() {
            let tok = cur.peek();
            return Err(LineError::new(TraceErrorKind::MissingField("meaning"), tok.span));
        }
        cur.skip_rest();
        Ok(())
    }

    fn attach_enode(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let idx = self.term_ref(cur, "term id")?;
        cur.number("generation")?;
        if let Some(&inst) = self.inst_stack.last() {
            self.terms[idx].resp_inst = Some(inst);
        }
        Ok(())
    }

    fn eq_expl(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let from = self.term_ref(cur, "term id")?;
        let kind_tok = cur.peek();
        let kind = cur.symbol("explanation kind")?;
        if kind == "root" {
            self.add_equality_expl(from, EqualityExpl::Root);
            return Ok(());
        }
        let mut args = Vec::new();
        while cur.eat(Token::Semicolon).is_none() {
            let tok = cur.peek();
            match tok.token {
                Token::TermId => {
                    args.push(self.existing_term(cur.bump())?);
                }
                Token::LParen | Token::RParen => {
                    cur.bump();
                }
                Token::Eol => {
                    return Err(LineError::new(TraceErrorKind::MissingField("`;`"), tok.span));
                }
                _ => {
                    cur.symbol("explanation argument")?;
                }
            }
        }
        let to = self.term_ref(cur, "target term id")?;

        let expl = if kind == "lit" {
            let Some(&eq) = args.first() else {
                return Err(LineError::new(
                    TraceErrorKind::MissingField("equality term"),
                    kind_tok.span,
                ));
            };
            EqualityExpl::Literal { eq, to }
        } else {
            EqualityExpl::Other { to }
        };
        self.add_equality_expl(from, expl);
        Ok(())
    }

    fn add_equality_expl(&mut self, term: usize, expl: EqualityExpl) {
        let expls = &mut self.terms[term].equality_expls;
        // push/pop can repeat the same explanation
        if !expls.contains(&expl) {
            expls.push(expl);
        }
    }

    fn fingerprint(cur: &mut Cursor<'_, '_>) -> LineResult<String> {
        let tok = cur.expect(Token::Fingerprint, "fingerprint")?;
        Ok(tok.text.to_ascii_lowercase())
    }

    /// Record the instance that produced `term` as a dependency
    fn blame(&self, term: usize, kind: DependencyKind, deps: &mut Vec<Dependency>) {
        if let Some(from) = self.terms[term].resp_inst {
            deps.push(Dependency { from, kind });
        }
    }

    /// A blamed pair `(a b)` depends on whoever produced the literal that
    /// made `a` equal to `b`
    fn blame_equality(&self, first: usize, second: usize, deps: &mut Vec<Dependency>) {
        if first == second {
            return;
        }
        for expl in &self.terms[first].equality_expls {
            if let EqualityExpl::Literal { eq, to } = expl {
                if *to == second {
                    self.blame(*eq, DependencyKind::Equality, deps);
                }
            }
        }
    }

    fn new_match(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let fingerprint = Self::fingerprint(cur)?;
        let quant = self.quant_ref(cur)?;
        self.term_ref(cur, "pattern id")?;
        self.term_list(cur)?;

        let mut dependencies = Vec::new();
        while !cur.at_end() {
            if cur.eat(Token::LParen).is_some() {
                let first = self.term_ref(cur, "term id")?;
                let second = self.term_ref(cur, "term id")?;
                cur.expect(Token::RParen, "`)`")?;
                self.blame_equality(first, second, &mut dependencies);
            } else {
                let term = self.term_ref(cur, "blamed term id")?;
                self.blame(term, DependencyKind::Term, &mut dependencies);
            }
        }

        self.matches.insert(fingerprint, PendingMatch { quant, dependencies });
        Ok(())
    }

    fn discovered_quant(&mut self, method: &str) -> usize {
        if let Some(&q) = self.discovered.get(method) {
            return q;
        }
        let q = self.quantifiers.len();
        self.quantifiers.push(Quantifier {
            name: method.to_string(),
            num_vars: 0,
            discovered: true,
            has_var_names: false,
            instances: 0,
        });
        self.discovered.insert(method.to_string(), q);
        q
    }

    fn inst_discovered(&mut self, cur: &mut Cursor<'_, '_>) -> LineResult<()> {
        let method = cur.symbol("discovery method")?.to_string();
        let fingerprint = Self::fingerprint(cur)?;

        // Theory-solving names the theory (`arith#`) before the blamed terms
        let mut dependencies = Vec::new();
        while !cur.at_end() {
            if cur.eat(Token::Semicolon).is_some() || cur.eat(Token::Word).is_some() {
                continue;
            }
            let term = self.term_ref(cur, "term id")?;
            self.blame(term, DependencyKind::Term, &mut dependencies);
        }

        let quant = self.discovered_quant(&method);
        self.matches.insert(fingerprint, PendingMatch { quant, dependencies });
        Ok(())
    }

    fn instance(&mut self, cur: &mut Cursor<'_, '_>, line_no: usize) -> LineResult<()> {
        let tok = cur.expect(Token::Fingerprint, "fingerprint")?;
        let fingerprint = tok.text.to_ascii_lowercase();
        let Some(pending) = self.matches.get(&fingerprint) else {
            return Err(LineError::new(
                TraceErrorKind::UnknownFingerprint(tok.text.to_string()),
                tok.span,
            ));
        };
        let quant = pending.quant;
        let dependencies = pending.dependencies.clone();

        if cur.peek_is(Token::TermId) {
            self.term_ref(cur, "resulting term id")?;
        }
        if cur.eat(Token::Semicolon).is_some() {
            cur.number("generation")?;
        }

        let iidx = self.instances.len();
        self.instances.push(Instance {
            line: line_no,
            quant,
            dependencies,
        });
        self.quantifiers[quant].instances += 1;
        self.inst_stack.push(iidx);
        self.max_depth = self.max_depth.max(self.inst_stack.len());
        Ok(())
    }

    /// Dependencies only become edges once the consuming instance is closed
    fn end_of_instance(&mut self, tag: SpannedToken<'_>) -> LineResult<()> {
        let iidx = self
            .inst_stack
            .pop()
            .ok_or_else(|| LineError::new(TraceErrorKind::UnbalancedEndOfInstance, tag.span))?;
        let deps = std::mem::take(&mut self.instances[iidx].dependencies);
        self.edges
            .extend(deps.into_iter().map(|dep| (dep.from, iidx, dep.kind)));
        Ok(())
    }

    #[must_use]
    pub const fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Quantifiers declared in the trace (discovered pseudo-quantifiers excluded)
    #[must_use]
    pub fn quantifier_count(&self) -> usize {
        self.quantifiers.iter().filter(|q| !q.discovered).count()
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn dependency_edges(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub const fn max_instance_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn open_instances(&self) -> usize {
        self.inst_stack.len()
    }

    /// Instantiated quantifiers, most instances first, ties by name
    #[must_use]
    pub fn quantifier_counts(&self) -> Vec<QuantifierCount> {
        let mut counts: Vec<QuantifierCount> = self
            .quantifiers
            .iter()
            .filter(|q| q.instances > 0)
            .map(|q| QuantifierCount {
                name: q.name.clone(),
                num_vars: q.num_vars,
                instances: q.instances,
                discovered: q.discovered,
                has_var_names: q.has_var_names,
            })
            .collect();
        counts.sort_by(|a, b| b.instances.cmp(&a.instances).then_with(|| a.name.cmp(&b.name)));
        counts
    }

    /// Instances of declared quantifiers and the dependencies between them.
    /// Theory-solving and MBQI instances are left out.
    #[must_use]
    pub fn instantiation_graph(&self) -> InstantiationGraph {
        let declared = |iidx: usize| !self.quantifiers[self.instances[iidx].quant].discovered;

        let nodes = (0..self.instances.len())
            .filter(|&i| declared(i))
            .map(|i| InstanceNode {
                line: self.instances[i].line,
                quantifier: self.quantifiers[self.instances[i].quant].name.clone(),
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|(from, to, _)| declared(*from) && declared(*to))
            .map(|&(from, to, kind)| InstanceEdge {
                from: self.instances[from].line,
                to: self.instances[to].line,
                kind,
            })
            .collect();
        InstantiationGraph { nodes, edges }
    }
}
