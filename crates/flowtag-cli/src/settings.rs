use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use flowtag_core::config::{
    FLOW_LOG_PATH, LOOKUP_TABLE_PATH, PORT_PROTOCOL_COUNTS_PATH, PROTOCOL_NUMBERS_PATH,
    TAG_COUNTS_PATH,
};
use flowtag_core::{FlowLogFormat, PipelineConfig, ReportFormat};

use crate::prompt::Prompter;

/// Optional settings read from `config.toml`. Anything left out falls through
/// to prompts and built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub protocol_numbers: Option<PathBuf>,
    pub lookup_table: Option<PathBuf>,
    pub flow_log: Option<PathBuf>,
    pub tag_counts: Option<PathBuf>,
    pub port_protocol_counts: Option<PathBuf>,
    pub custom: Option<bool>,
    pub delimiter: Option<char>,
    pub report_format: Option<ReportFormat>,
}

impl FileConfig {
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowtag")
            .join("config.toml")
    }

    /// Read an explicitly named config file, or the default one if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }
}

/// Values given on the command line; these beat every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// protocol numbers, lookup table, flow log
    pub inputs: Option<[PathBuf; 3]>,
    /// tag counts, port/protocol counts
    pub outputs: Option<[PathBuf; 2]>,
    pub custom: bool,
    pub delimiter: Option<char>,
    pub report_format: Option<ReportFormat>,
}

struct Slot {
    label: &'static str,
    default: &'static str,
    explicit: Option<PathBuf>,
    from_file: Option<PathBuf>,
}

/// Merge command line, config file, prompts, and defaults into one config.
///
/// Per field: command line > config file > prompt answer > default. Prompts
/// are only issued for fields neither of the first two supplied.
pub fn resolve(
    overrides: &Overrides,
    file: FileConfig,
    prompter: &mut dyn Prompter,
    want_outputs: bool,
) -> Result<PipelineConfig> {
    let [explicit_protocols, explicit_lookup, explicit_flow_log] = match &overrides.inputs {
        Some([a, b, c]) => [Some(a.clone()), Some(b.clone()), Some(c.clone())],
        None => [None, None, None],
    };
    let [explicit_tags, explicit_ports] = match &overrides.outputs {
        Some([a, b]) => [Some(a.clone()), Some(b.clone())],
        None => [None, None],
    };

    let mut slots = vec![
        Slot {
            label: "> Input File: protocol_numbers.csv: ",
            default: PROTOCOL_NUMBERS_PATH,
            explicit: explicit_protocols,
            from_file: file.protocol_numbers,
        },
        Slot {
            label: "> Input File: lookup_table.csv: ",
            default: LOOKUP_TABLE_PATH,
            explicit: explicit_lookup,
            from_file: file.lookup_table,
        },
        Slot {
            label: "> Input File: flow_log: ",
            default: FLOW_LOG_PATH,
            explicit: explicit_flow_log,
            from_file: file.flow_log,
        },
    ];
    if want_outputs {
        slots.push(Slot {
            label: "> Output File: tag_counts.csv: ",
            default: TAG_COUNTS_PATH,
            explicit: explicit_tags,
            from_file: file.tag_counts,
        });
        slots.push(Slot {
            label: "> Output File: port_protocol_counts.csv: ",
            default: PORT_PROTOCOL_COUNTS_PATH,
            explicit: explicit_ports,
            from_file: file.port_protocol_counts,
        });
    }

    let needs_prompt = slots
        .iter()
        .any(|s| s.explicit.is_none() && s.from_file.is_none());
    if needs_prompt {
        prompter.intro()?;
    }

    let mut paths = Vec::with_capacity(slots.len());
    for slot in slots {
        let value = match slot.explicit.or(slot.from_file) {
            Some(path) => path,
            None => prompter
                .ask(slot.label)?
                .map(|answer| answer.trim().to_string())
                .filter(|answer| !answer.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(slot.default)),
        };
        paths.push(value);
    }

    if needs_prompt {
        prompter.outro()?;
    }

    let mut config = PipelineConfig::default();
    let mut paths = paths.into_iter();
    if let (Some(protocols), Some(lookup), Some(flow_log)) = (paths.next(), paths.next(), paths.next())
    {
        config.protocol_numbers = protocols;
        config.lookup_table = lookup;
        config.flow_log = flow_log;
    }
    if let (Some(tags), Some(ports)) = (paths.next(), paths.next()) {
        config.tag_counts = tags;
        config.port_protocol_counts = ports;
    }

    let custom = overrides.custom || file.custom.unwrap_or(false);
    if custom {
        config.flow_log_format = FlowLogFormat::Custom {
            delimiter: overrides.delimiter.or(file.delimiter).unwrap_or(' '),
        };
    }
    config.report_format = overrides
        .report_format
        .or(file.report_format)
        .unwrap_or_default();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::NoPrompt;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<&'static str>,
        asked: Vec<String>,
        intros: usize,
    }

    impl Prompter for Scripted {
        fn intro(&mut self) -> Result<()> {
            self.intros += 1;
            Ok(())
        }

        fn ask(&mut self, label: &str) -> Result<Option<String>> {
            self.asked.push(label.to_string());
            Ok(self.answers.pop_front().map(String::from))
        }
    }

    fn paths(inputs: [&str; 3]) -> [PathBuf; 3] {
        inputs.map(PathBuf::from)
    }

    #[test]
    fn test_explicit_args_skip_prompts() {
        let overrides = Overrides {
            inputs: Some(paths(["p.csv", "l.csv", "f.log"])),
            outputs: Some([PathBuf::from("t.csv"), PathBuf::from("pp.csv")]),
            ..Overrides::default()
        };
        let mut prompter = Scripted::default();

        let config = resolve(&overrides, FileConfig::default(), &mut prompter, true).unwrap();

        assert_eq!(prompter.intros, 0);
        assert!(prompter.asked.is_empty());
        assert_eq!(config.protocol_numbers, PathBuf::from("p.csv"));
        assert_eq!(config.lookup_table, PathBuf::from("l.csv"));
        assert_eq!(config.flow_log, PathBuf::from("f.log"));
        assert_eq!(config.tag_counts, PathBuf::from("t.csv"));
        assert_eq!(config.port_protocol_counts, PathBuf::from("pp.csv"));
    }

    #[test]
    fn test_blank_answers_take_defaults() {
        let mut prompter = Scripted {
            answers: VecDeque::from(["  ", "my_lookup.csv ", "", "", "out/ports.csv"]),
            ..Scripted::default()
        };

        let config = resolve(
            &Overrides::default(),
            FileConfig::default(),
            &mut prompter,
            true,
        )
        .unwrap();

        assert_eq!(prompter.intros, 1);
        assert_eq!(prompter.asked.len(), 5);
        assert_eq!(config.protocol_numbers, PathBuf::from(PROTOCOL_NUMBERS_PATH));
        assert_eq!(config.lookup_table, PathBuf::from("my_lookup.csv"));
        assert_eq!(config.flow_log, PathBuf::from(FLOW_LOG_PATH));
        assert_eq!(config.tag_counts, PathBuf::from(TAG_COUNTS_PATH));
        assert_eq!(config.port_protocol_counts, PathBuf::from("out/ports.csv"));
    }

    #[test]
    fn test_config_file_beats_prompt_and_args_beat_file() {
        let file = FileConfig {
            flow_log: Some(PathBuf::from("from_file.log")),
            tag_counts: Some(PathBuf::from("file_tags.csv")),
            port_protocol_counts: Some(PathBuf::from("file_ports.csv")),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            outputs: Some([PathBuf::from("arg_tags.csv"), PathBuf::from("arg_ports.csv")]),
            ..Overrides::default()
        };
        let mut prompter = Scripted {
            answers: VecDeque::from(["prompted_protocols.csv", ""]),
            ..Scripted::default()
        };

        let config = resolve(&overrides, file, &mut prompter, true).unwrap();

        assert_eq!(
            prompter.asked,
            vec![
                "> Input File: protocol_numbers.csv: ",
                "> Input File: lookup_table.csv: ",
            ]
        );
        assert_eq!(config.protocol_numbers, PathBuf::from("prompted_protocols.csv"));
        assert_eq!(config.lookup_table, PathBuf::from(LOOKUP_TABLE_PATH));
        assert_eq!(config.flow_log, PathBuf::from("from_file.log"));
        assert_eq!(config.tag_counts, PathBuf::from("arg_tags.csv"));
    }

    #[test]
    fn test_no_prompter_uses_defaults() {
        let config =
            resolve(&Overrides::default(), FileConfig::default(), &mut NoPrompt, true).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_outputs_not_prompted_when_unwanted() {
        let mut prompter = Scripted::default();
        let overrides = Overrides {
            inputs: Some(paths(["p.csv", "l.csv", "f.log"])),
            ..Overrides::default()
        };

        resolve(&overrides, FileConfig::default(), &mut prompter, false).unwrap();
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_custom_format_and_delimiter() {
        let file = FileConfig {
            custom: Some(true),
            delimiter: Some(','),
            report_format: Some(ReportFormat::Json),
            ..FileConfig::default()
        };

        let config = resolve(&Overrides::default(), file.clone(), &mut NoPrompt, true).unwrap();
        assert_eq!(config.flow_log_format, FlowLogFormat::Custom { delimiter: ',' });
        assert_eq!(config.report_format, ReportFormat::Json);

        let overrides = Overrides {
            delimiter: Some('\t'),
            report_format: Some(ReportFormat::Csv),
            ..Overrides::default()
        };
        let config = resolve(&overrides, file, &mut NoPrompt, true).unwrap();
        assert_eq!(config.flow_log_format, FlowLogFormat::Custom { delimiter: '\t' });
        assert_eq!(config.report_format, ReportFormat::Csv);
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "flow_log = \"logs/vpc.log\"\ncustom = true\ndelimiter = \",\"\nreport_format = \"json\"\n",
        )
        .unwrap();

        let file = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(file.flow_log, Some(PathBuf::from("logs/vpc.log")));
        assert_eq!(file.custom, Some(true));
        assert_eq!(file.delimiter, Some(','));
        assert_eq!(file.report_format, Some(ReportFormat::Json));
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "flowlog = \"typo.log\"\n").unwrap();

        assert!(FileConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
