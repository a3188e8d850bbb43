//! Compiler and runtime for a small Pine-style indicator dialect.
//!
//! A script moves through three stages: `parse` builds an AST from source
//! text, `generate` lowers the AST into a flat target program (and renders
//! it as readable text), and `execute` interprets that program against a
//! [`bar_core::BarSeries`], producing named plots aligned to the bars. The
//! stages are separate types, so a script cannot be executed without being
//! generated first.
//!
//! ```no_run
//! use bar_core::{Bar, BarSeries};
//! use script_engine::run_script;
//!
//! let bars = BarSeries::from_bars([Bar {
//!     time: 0,
//!     open: 1.0,
//!     high: 1.5,
//!     low: 0.5,
//!     close: 1.2,
//!     volume: 100.0,
//! }]);
//! let result = run_script("plot(close, \"Close\")", &bars)?;
//! assert_eq!(result.plots[0].title, "Close");
//! # Ok::<(), script_engine::ScriptError>(())
//! ```

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod target;
pub mod token;

pub use ast::Program;
pub use codegen::{generate, GeneratedScript};
pub use error::{ExecutionError, ScriptError, SyntaxError};
pub use parser::parse;
pub use runtime::{execute, ExecutionResult, Plot};
pub use target::TargetProgram;

use bar_core::BarSeries;

/// Parse, lower, and execute a script in one call.
pub fn run_script(source: &str, bars: &BarSeries) -> Result<ExecutionResult, ScriptError> {
    let program = parse(source)?;
    let script = generate(&program);
    let result = execute(&script, bars)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use bar_core::{Bar, BarSeries};

    fn five_bars() -> BarSeries {
        BarSeries::from_bars((0..5).map(|i| {
            let close = (i + 1) as f64;
            Bar {
                time: i as i64 * 60,
                open: close - 0.25,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000.0,
            }
        }))
    }

    #[test]
    fn plot_close_round_trip() {
        let bars = five_bars();
        let result = run_script("plot(close)", &bars).unwrap();
        assert_eq!(result.plots.len(), 1);
        assert_eq!(result.plots[0].series, bars.close());
    }

    #[test]
    fn pure_comparison_bindings_vanish_from_generated_text() {
        let source = "emaFast = ta.ema(close, 9)\n\
                      emaSlow = ta.ema(close, 21)\n\
                      bull = emaFast > emaSlow\n\
                      plot(emaFast)";
        let script = generate(&parse(source).unwrap());
        assert!(!script.text.contains("bull"));
        assert!(script.text.contains("const emaFast = ta.ema(close, 9);"));
        assert!(script.text.contains("const emaSlow = ta.ema(close, 21);"));
    }

    #[test]
    fn namespaces_rewrite_in_generated_text() {
        let source = "len = input.int(14, \"Length\")\nfast = ema(close, 9)\nplot(fast)";
        let script = generate(&parse(source).unwrap());
        assert!(script.text.contains("Input.int(14, \"Length\")"));
        assert!(script.text.contains("ta.ema(close, 9)"));
        assert!(!script.text.contains("input.int"));
    }

    #[test]
    fn plot_title_and_color_sugar() {
        let source = "plot(close, \"Close\", color=color.green)";
        let script = generate(&parse(source).unwrap());
        assert_eq!(
            script.text,
            "context.plot(close, { title: \"Close\", color: \"green\" });\n"
        );
        let result = execute(&script, &five_bars()).unwrap();
        assert_eq!(result.plots[0].title, "Close");
        assert_eq!(result.plots[0].color.as_deref(), Some("green"));
    }

    #[test]
    fn full_pipeline_produces_an_aligned_plot() {
        let source = "indicator(\"EMA Demo\", overlay=true)\n\
                      len = input.int(9, \"Length\")\n\
                      fast = ta.ema(close, len)\n\
                      plot(fast, \"Fast EMA\", color=color.blue)";
        let bars = five_bars();
        let result = run_script(source, &bars).unwrap();
        assert_eq!(result.indicator_name, "EMA Demo");
        assert_eq!(result.inputs.get("Length"), Some(&serde_json::json!(9)));
        assert_eq!(result.plots.len(), 1);
        let plot = &result.plots[0];
        assert_eq!(plot.title, "Fast EMA");
        assert_eq!(plot.series.len(), bars.len());
        // EMA seeds from the first close.
        assert_approx_eq!(plot.series[0], 1.0, 1e-12);
        let points = plot.points(&bars);
        assert_eq!(points[0].time, 0);
        assert_eq!(points[4].time, 240);
    }

    #[test]
    fn syntax_errors_stop_the_pipeline() {
        let bars = five_bars();
        let err = run_script("plot(\"oops", &bars).unwrap_err();
        let ScriptError::Syntax(err) = err else {
            panic!("expected a syntax error, got {err:?}");
        };
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn execution_errors_carry_the_source_line() {
        let bars = five_bars();
        let err = run_script("fast = ta.ema(close, 9)\nplot(missing)", &bars).unwrap_err();
        let ScriptError::Execution(err) = err else {
            panic!("expected an execution error, got {err:?}");
        };
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("undefined name"));
    }

    #[test]
    fn runs_are_reproducible() {
        let source = "plot(ta.rsi(close, 3))";
        let bars = five_bars();
        let first = run_script(source, &bars).unwrap();
        let second = run_script(source, &bars).unwrap();
        assert_eq!(first, second);
    }
}
