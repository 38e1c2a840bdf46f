//! Engine, compiler and VM configuration.
//!
//! Every options struct has a matching `*Override` struct whose fields are
//! all optional; `override_with` copies the fields that are set.

use crate::vm::MAX_THREADS;

/// Options for compiling a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reject programs that do not start with a module declaration.
    pub require_module_declaration: bool,
    /// Run the constant folding and inlining pass.
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            require_module_declaration: false,
            optimize: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptionsOverride {
    pub require_module_declaration: Option<bool>,
    pub optimize: Option<bool>,
}

impl CompileOptions {
    pub fn override_with(&mut self, overrides: &CompileOptionsOverride) {
        if let Some(value) = overrides.require_module_declaration {
            self.require_module_declaration = value;
        }
        if let Some(value) = overrides.optimize {
            self.optimize = value;
        }
    }
}

/// Options for a VM instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    /// Execution threads that may coexist. Clamped to [`MAX_THREADS`].
    pub max_threads: usize,
    /// Nested script calls before a stack overflow is raised.
    pub max_call_depth: usize,
    /// Registers per thread. At least 3 are always allocated.
    pub register_count: usize,
    /// Lower bound of the adaptive collection threshold.
    pub gc_min_threshold: usize,
    /// Upper bound of the adaptive collection threshold.
    pub gc_max_threshold: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_threads: MAX_THREADS,
            max_call_depth: 256,
            register_count: 8,
            gc_min_threshold: 64,
            gc_max_threshold: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmOptionsOverride {
    pub max_threads: Option<usize>,
    pub max_call_depth: Option<usize>,
    pub register_count: Option<usize>,
    pub gc_min_threshold: Option<usize>,
    pub gc_max_threshold: Option<usize>,
}

impl VmOptions {
    pub fn override_with(&mut self, overrides: &VmOptionsOverride) {
        if let Some(value) = overrides.max_threads {
            self.max_threads = value;
        }
        if let Some(value) = overrides.max_call_depth {
            self.max_call_depth = value;
        }
        if let Some(value) = overrides.register_count {
            self.register_count = value;
        }
        if let Some(value) = overrides.gc_min_threshold {
            self.gc_min_threshold = value;
        }
        if let Some(value) = overrides.gc_max_threshold {
            self.gc_max_threshold = value;
        }
    }

    /// The options with every bound brought into its valid range.
    pub fn normalized(&self) -> Self {
        let gc_min_threshold = self.gc_min_threshold.max(1);
        Self {
            max_threads: self.max_threads.clamp(1, MAX_THREADS),
            max_call_depth: self.max_call_depth.max(1),
            register_count: self.register_count.max(3),
            gc_min_threshold,
            gc_max_threshold: self.gc_max_threshold.max(gc_min_threshold),
        }
    }
}

/// Engine-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub default_compile_options: CompileOptions,
    pub default_vm_options: VmOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn override_replaces_only_set_fields() {
        let mut options = CompileOptions::default();
        options.override_with(&CompileOptionsOverride {
            optimize: Some(false),
            ..Default::default()
        });
        assert_eq!(
            options,
            CompileOptions {
                require_module_declaration: false,
                optimize: false,
            }
        );
    }

    #[test]
    fn normalized_clamps_bounds() {
        let options = VmOptions {
            max_threads: 99,
            max_call_depth: 0,
            register_count: 1,
            gc_min_threshold: 10,
            gc_max_threshold: 2,
        }
        .normalized();
        assert_eq!(options.max_threads, MAX_THREADS);
        assert_eq!(options.max_call_depth, 1);
        assert_eq!(options.register_count, 3);
        assert_eq!(options.gc_max_threshold, 10);
    }
}
