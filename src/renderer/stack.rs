//! Template expansion stack management.

/// A template transclusion stack frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ExpansionFrame {
    /// The canonical name of the template rendered by this frame.
    pub template_name: String,
    /// The number of frames below this one.
    pub depth: usize,
}

/// Why a transclusion was refused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Refusal {
    /// The template is already being expanded.
    Loop,
    /// The stack is full.
    Depth,
}

/// The stack of templates currently being expanded.
#[derive(Debug)]
pub(crate) struct ExpansionStack {
    /// Active frames, outermost first.
    frames: Vec<ExpansionFrame>,
    /// The maximum number of simultaneously active frames.
    max_depth: usize,
}

impl ExpansionStack {
    /// Creates a new empty stack with the given depth limit.
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Enforces the maximum stack depth and ensures that no template is called
    /// recursively.
    pub fn check(&self, name: &str) -> Result<(), Refusal> {
        if self.frames.iter().any(|frame| frame.template_name == name) {
            self.debug_backtrace(name);
            Err(Refusal::Loop)
        } else if self.frames.len() >= self.max_depth {
            self.debug_backtrace(name);
            Err(Refusal::Depth)
        } else {
            Ok(())
        }
    }

    /// The number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pops the innermost frame.
    pub fn pop(&mut self) -> Option<ExpansionFrame> {
        self.frames.pop()
    }

    /// Pushes a frame for the named template.
    pub fn push(&mut self, name: String) {
        let depth = self.frames.len();
        self.frames.push(ExpansionFrame {
            template_name: name,
            depth,
        });
    }

    /// Emits a backtrace to the debug log.
    fn debug_backtrace(&self, name: &str) {
        log::debug!("{:>2}. {name}", self.frames.len());
        for frame in self.frames.iter().rev() {
            log::debug!("{:>2}. {}", frame.depth, frame.template_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_and_depth() {
        let mut stack = ExpansionStack::new(2);
        assert_eq!(stack.check("A"), Ok(()));
        stack.push("A".into());
        assert_eq!(stack.check("A"), Err(Refusal::Loop));
        assert_eq!(stack.check("B"), Ok(()));
        stack.push("B".into());
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.check("C"), Err(Refusal::Depth));
        assert_eq!(
            stack.pop(),
            Some(ExpansionFrame {
                template_name: "B".into(),
                depth: 1
            })
        );
        assert_eq!(stack.check("C"), Ok(()));
    }
}
