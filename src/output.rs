use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        let file_name = formatx!(&self.file_template, location_key).map_err(|err| {
            anyhow!("Could not name the output file for '{location_key}': {err:?}")
        })?;
        Ok(BufWriter::new(File::create(
            self.directory_path.join(file_name),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::fs;

    #[rstest]
    fn should_write_to_file_named_from_template() {
        let directory = std::env::temp_dir().join("hvac_unitary_output_test");
        fs::create_dir_all(&directory).unwrap();
        let output = FileOutput::new(directory.clone(), "demo_{}_results.csv".to_string());

        {
            let mut writer = (&output).writer_for_location_key("heat pump").unwrap();
            writer.write_all(b"Time\n").unwrap();
        }

        let written = fs::read_to_string(directory.join("demo_heat pump_results.csv")).unwrap();
        assert_eq!(written, "Time\n");
    }

    #[rstest]
    fn should_treat_sink_as_noop() {
        assert!(SinkOutput.is_noop());
        assert!(!FileOutput::new(PathBuf::from("."), "{}.csv".to_string()).is_noop());
    }
}
