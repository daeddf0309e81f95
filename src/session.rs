use crate::buffer::SnippetBuffer;
use crate::config::Config;
use crate::synth::{Profile, SourceSynthesizer, Variant};

/// State of one interactive session, owned by the [`crate::Interpreter`].
#[derive(Debug, Clone)]
pub struct Session {
    pub buffer: SnippetBuffer,
    pub config: Config,
    pub profile: Profile,
    pub should_exit: bool,
}

impl Session {
    /// Fresh session whose buffer starts with the configured common includes.
    pub fn new(config: Config, profile: Profile) -> Self {
        let mut buffer = SnippetBuffer::new();
        for header in config.common_includes() {
            buffer.push_header(header);
        }
        Self {
            buffer,
            config,
            profile,
            should_exit: false,
        }
    }

    /// Source for the current buffer contents.
    pub fn synthesize(&self, variant: Variant) -> String {
        let rendered = self.buffer.render();
        SourceSynthesizer::new(&rendered.headers, &rendered.statements)
            .with_profile(self.profile)
            .generate(variant)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::builtin(), Profile::Standard)
    }
}
