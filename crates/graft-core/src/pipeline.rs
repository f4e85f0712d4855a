//! Pass plumbing and the end-to-end compile driver.

use tracing::{debug, info, warn};

use crate::build;
use crate::diag::{Diagnostic, DiagnosticSink};
use crate::error::CoreError;
use crate::front::ResolvedProgram;
use crate::ir::Program;
use crate::lower;
use crate::passes::{
    CastLower, CatchCollapse, CompoundAssignBreaker, Devirtualize, Reachability, Simplify,
};

pub struct PassResult {
    pub program: Program,
    pub changed: bool,
}

/// A whole-program transformation. Passes take the program by value and
/// report whether they changed anything, so pipelines can iterate to a
/// fixed point.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn apply(&mut self, program: Program) -> Result<PassResult, CoreError>;
}

/// An ordered sequence of passes, optionally iterated to a fixed point.
#[derive(Default)]
pub struct PassPipeline {
    passes: Vec<Box<dyn Pass>>,
    fixpoint: bool,
}

/// Iteration cap for fixpoint pipelines. A pipeline that is still changing
/// after this many rounds almost certainly has a pass that misreports
/// `changed`.
const MAX_FIXPOINT_ITERATIONS: usize = 50;

impl PassPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn set_fixpoint(&mut self, fixpoint: bool) -> &mut Self {
        self.fixpoint = fixpoint;
        self
    }

    pub fn run(&mut self, mut program: Program) -> Result<Program, CoreError> {
        for round in 0.. {
            let mut changed = false;
            for pass in &mut self.passes {
                let result = pass.apply(program)?;
                program = result.program;
                changed |= result.changed;
                debug!(pass = pass.name(), changed = result.changed, "pass done");
            }
            if !self.fixpoint || !changed {
                break;
            }
            if round + 1 >= MAX_FIXPOINT_ITERATIONS {
                warn!("pass pipeline did not reach a fixed point; stopping");
                break;
            }
        }
        Ok(program)
    }
}

/// Which optimization and lowering passes run. All on by default; the CLI
/// builds one from `--skip-pass` flags.
#[derive(Debug, Clone)]
pub struct PassConfig {
    pub catch_collapse: bool,
    pub compound_assign: bool,
    pub reachability: bool,
    pub devirtualize: bool,
    pub simplify: bool,
    pub cast_lower: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            catch_collapse: true,
            compound_assign: true,
            reachability: true,
            devirtualize: true,
            simplify: true,
            cast_lower: true,
        }
    }
}

impl PassConfig {
    pub fn from_skip_list<S: AsRef<str>>(skips: &[S]) -> Result<Self, CoreError> {
        let mut config = Self::default();
        for skip in skips {
            match skip.as_ref() {
                "catch-collapse" => config.catch_collapse = false,
                "compound-assign" => config.compound_assign = false,
                "reachability" => config.reachability = false,
                "devirtualize" => config.devirtualize = false,
                "simplify" => config.simplify = false,
                "cast-lower" => config.cast_lower = false,
                other => return Err(CoreError::UnknownPass(other.to_string())),
            }
        }
        Ok(config)
    }
}

pub struct CompileOutput {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Compile a resolved frontend program down to optimized IR.
///
/// Building and lowering collect per-unit diagnostics; if any unit failed,
/// the optimization pipeline is skipped and the partial program is returned
/// alongside the diagnostics.
pub fn compile(
    resolved: &ResolvedProgram,
    config: &PassConfig,
) -> Result<CompileOutput, CoreError> {
    let mut sink = DiagnosticSink::new();
    let (mut program, mut xref) = build::build(resolved, &mut sink)?;
    lower::lower(&mut program, &mut xref, resolved, &mut sink)?;

    if sink.has_errors() {
        info!(
            errors = sink.diagnostics().len(),
            "compile failed before optimization"
        );
        return Ok(CompileOutput {
            program,
            diagnostics: sink.diagnostics().to_vec(),
        });
    }

    // Structural desugaring runs once, before any optimization.
    let mut desugar = PassPipeline::new();
    if config.catch_collapse {
        desugar.add(CatchCollapse::default());
    }
    if config.compound_assign {
        desugar.add(CompoundAssignBreaker::default());
    }
    program = desugar.run(program)?;

    // The optimization loop iterates until nothing shrinks further.
    let mut optimize = PassPipeline::new();
    optimize.set_fixpoint(true);
    if config.reachability {
        optimize.add(Reachability::default());
    }
    if config.devirtualize {
        optimize.add(Devirtualize::default());
    }
    if config.simplify {
        optimize.add(Simplify::default());
    }
    program = optimize.run(program)?;

    // Cast lowering introduces helper calls and query ids, then a final
    // prune and cleanup sweep up what it made dead or foldable.
    let mut finalize = PassPipeline::new();
    if config.cast_lower {
        finalize.add(CastLower::default());
    }
    if config.reachability {
        finalize.add(Reachability::default());
    }
    if config.simplify {
        finalize.add(Simplify::default());
    }
    program = finalize.run(program)?;

    info!(
        types = program.declared.len(),
        entry_points = program.entry_points.len(),
        "compile finished"
    );
    Ok(CompileOutput {
        program,
        diagnostics: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountedPass {
        remaining: u32,
        runs: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl Pass for CountedPass {
        fn name(&self) -> &'static str {
            "counted"
        }

        fn apply(&mut self, program: Program) -> Result<PassResult, CoreError> {
            self.runs.set(self.runs.get() + 1);
            let changed = self.remaining > 0;
            self.remaining = self.remaining.saturating_sub(1);
            Ok(PassResult { program, changed })
        }
    }

    /// A fixpoint pipeline reruns until every pass reports no change.
    #[test]
    fn fixpoint_runs_until_stable() {
        let runs = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut pipeline = PassPipeline::new();
        pipeline.set_fixpoint(true);
        pipeline.add(CountedPass {
            remaining: 3,
            runs: runs.clone(),
        });
        pipeline.run(Program::new()).unwrap();
        // Three changing rounds plus the stable one.
        assert_eq!(runs.get(), 4);
    }

    /// Without fixpoint mode each pass runs exactly once.
    #[test]
    fn single_shot_pipeline() {
        let runs = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut pipeline = PassPipeline::new();
        pipeline.add(CountedPass {
            remaining: 3,
            runs: runs.clone(),
        });
        pipeline.run(Program::new()).unwrap();
        assert_eq!(runs.get(), 1);
    }

    /// Unknown names in the skip list are rejected.
    #[test]
    fn skip_list_validation() {
        let config = PassConfig::from_skip_list(&["simplify", "cast-lower"]).unwrap();
        assert!(!config.simplify);
        assert!(!config.cast_lower);
        assert!(config.reachability);
        assert!(PassConfig::from_skip_list(&["no-such-pass"]).is_err());
    }
}
