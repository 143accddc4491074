use crate::eval::evaluator::ConditionResult;
use crate::ServedValue;

const RULE_IGNORED_MSG: &str =
    "The current targeting rule is ignored and the evaluation continues with the next rule.";

#[derive(Default)]
pub struct EvalLogBuilder {
    content: String,
    indent: usize,
}

impl EvalLogBuilder {
    const NEW_LINE_CHAR: char = '\n';
    const INDENT_SEQ: &'static str = "  ";

    pub fn inc_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn dec_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn new_ln(&mut self, message: Option<&str>) -> &mut Self {
        self.content.push(Self::NEW_LINE_CHAR);
        self.content
            .push_str(Self::INDENT_SEQ.repeat(self.indent).as_str());
        if let Some(msg) = message {
            self.content.push_str(msg);
        }
        self
    }

    pub fn append(&mut self, val: &str) -> &mut Self {
        self.content.push_str(val);
        self
    }

    pub fn append_then_clause(
        &mut self,
        new_line: bool,
        result: &ConditionResult,
        served_value: Option<&ServedValue>,
    ) -> &mut Self {
        self.inc_indent();
        if new_line {
            self.new_ln(None);
        } else {
            self.append(" ");
        }
        self.append("THEN ");
        match served_value {
            Some(sv) => self.append(format!("'{}'", sv.value).as_str()),
            None => self.append("% options"),
        };
        self.append(" => ");
        match result {
            ConditionResult::Done(true) => self.append("MATCH, applying rule"),
            ConditionResult::Done(false) => self.append("no match"),
            _ => self.append(format!("{result}").as_str()),
        };
        if !result.is_ok() {
            self.inc_indent().new_ln(Some(RULE_IGNORED_MSG)).dec_indent();
        }
        self.dec_indent()
    }

    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

#[cfg(test)]
mod log_builder_tests {
    use crate::eval::evaluator::ConditionResult;
    use crate::eval::log_builder::EvalLogBuilder;

    #[test]
    fn indentation() {
        let mut log = EvalLogBuilder::default();
        log.append("Evaluating 'flag'")
            .inc_indent()
            .new_ln(Some("first"))
            .inc_indent()
            .new_ln(Some("second"))
            .dec_indent()
            .dec_indent()
            .dec_indent()
            .new_ln(Some("last"));
        assert_eq!(log.content(), "Evaluating 'flag'\n  first\n    second\nlast");
    }

    #[test]
    fn then_clause_of_failed_condition() {
        let mut log = EvalLogBuilder::default();
        log.append("IF x");
        log.append_then_clause(false, &ConditionResult::NoUser, None);
        assert_eq!(
            log.content(),
            "IF x THEN % options => cannot evaluate, User Object is missing\n    The current targeting rule is ignored and the evaluation continues with the next rule."
        );
    }
}
