//! Layered system-prompt assembly
//!
//! Layers are appended in a fixed order (identity first, instructions
//! last) and trimmed against a character budget from the end, so the
//! identity and personality layers survive when space runs out.

pub struct ContextAssembler {
    layers: Vec<(&'static str, String)>,
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self {
            layers: Vec::new(),
            budget_chars,
        }
    }

    /// Append a layer; empty content is skipped.
    pub fn push(&mut self, name: &'static str, content: impl Into<String>) {
        let content = content.into();
        if !content.trim().is_empty() {
            self.layers.push((name, content));
        }
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|(n, _)| *n).collect()
    }

    /// Join layers, dropping whole trailing layers that would overflow
    /// the budget. The last layer (instructions) is always kept.
    pub fn assemble(mut self) -> String {
        if self.layers.is_empty() {
            return String::new();
        }

        let instructions = if self.layers.last().map(|(n, _)| *n) == Some("instructions") {
            self.layers.pop()
        } else {
            None
        };
        let reserved = instructions.as_ref().map(|(_, c)| c.len() + 2).unwrap_or(0);

        let mut used = 0usize;
        let mut kept: Vec<String> = Vec::new();
        for (name, content) in self.layers {
            let cost = content.len() + 2;
            if used + cost + reserved > self.budget_chars {
                tracing::debug!("context budget reached, dropping layer '{}'", name);
                continue;
            }
            used += cost;
            kept.push(content);
        }
        if let Some((_, content)) = instructions {
            kept.push(content);
        }
        kept.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_join_in_order() {
        let mut asm = ContextAssembler::new(10_000);
        asm.push("identity", "I am Anima.");
        asm.push("history", "User: hi\nYou: hello");
        asm.push("instructions", "Reply warmly.");
        let prompt = asm.assemble();
        let identity_pos = prompt.find("I am Anima").unwrap();
        let history_pos = prompt.find("User: hi").unwrap();
        let instructions_pos = prompt.find("Reply warmly").unwrap();
        assert!(identity_pos < history_pos);
        assert!(history_pos < instructions_pos);
    }

    #[test]
    fn test_empty_layers_skipped() {
        let mut asm = ContextAssembler::new(10_000);
        asm.push("identity", "I am Anima.");
        asm.push("knowledge", "");
        asm.push("cascade", "   ");
        assert_eq!(asm.layer_names(), vec!["identity"]);
    }

    #[test]
    fn test_budget_drops_late_layers_keeps_instructions() {
        let mut asm = ContextAssembler::new(60);
        asm.push("identity", "I am Anima.");
        asm.push("history", "x".repeat(500));
        asm.push("instructions", "Reply warmly.");
        let prompt = asm.assemble();
        assert!(prompt.contains("I am Anima."));
        assert!(!prompt.contains("xxxxx"));
        assert!(prompt.contains("Reply warmly."));
    }

    #[test]
    fn test_empty_assembler() {
        let asm = ContextAssembler::new(100);
        assert_eq!(asm.assemble(), "");
    }
}
