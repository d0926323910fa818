use std::fmt;

use crate::descriptor::ReactionDescriptor;

impl<B> fmt::Debug for ReactionDescriptor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionDescriptor")
            .field("inputs", &self.input_label())
            .field("outputs", &self.output_label())
            .field("retry", &self.retry)
            .field("source_hash", &self.source_hash)
            .finish()
    }
}

impl<B> fmt::Display for ReactionDescriptor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input_label(), self.output_label())
    }
}
