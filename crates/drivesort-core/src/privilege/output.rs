/// The merged stdout/stderr stream of a privileged run.
use crate::error::PrivilegeError;
use std::io::{self, Read};
use std::process::Child;

/// Readable output of a launched tool.
///
/// Reading blocks until the tool writes or closes its end of the pipe, so
/// this must only be consumed on a background thread.
pub struct PrivilegedOutput {
    reader: Box<dyn Read + Send>,
    child: Option<Child>,
    denial_codes: &'static [i32],
}

impl PrivilegedOutput {
    /// Wrap an arbitrary reader. The result has no process to reap, so
    /// [`Self::collect`] only fails on read errors.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
            denial_codes: &[],
        }
    }

    pub(crate) fn spawned(
        reader: impl Read + Send + 'static,
        child: Child,
        denial_codes: &'static [i32],
    ) -> Self {
        Self {
            reader: Box::new(reader),
            child: Some(child),
            denial_codes,
        }
    }

    /// Read to EOF, reap the process, and return everything it printed.
    ///
    /// A non-zero exit becomes [`PrivilegeError::ToolExited`], or
    /// [`PrivilegeError::AuthorizationDenied`] when the code is one the
    /// elevation wrapper uses for refusals.
    pub fn collect(mut self) -> Result<Vec<u8>, PrivilegeError> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf)?;

        let Some(mut child) = self.child.take() else {
            return Ok(buf);
        };
        let status = child.wait()?;
        if status.success() {
            return Ok(buf);
        }

        let output = String::from_utf8_lossy(&buf).into_owned();
        match status.code() {
            Some(code) if self.denial_codes.contains(&code) => Err(
                PrivilegeError::AuthorizationDenied(format!("elevation helper exited with {code}")),
            ),
            code => Err(PrivilegeError::ToolExited { code, output }),
        }
    }
}

impl Read for PrivilegedOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for PrivilegedOutput {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Close our end first so a tool still writing gets EPIPE instead
            // of blocking forever on a full pipe.
            self.reader = Box::new(io::empty());
            let _ = child.wait();
        }
    }
}

impl std::fmt::Debug for PrivilegedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedOutput")
            .field("pid", &self.child.as_ref().map(Child::id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_plain_reader() {
        let out = PrivilegedOutput::from_reader(io::Cursor::new(b"/\na\n".to_vec()));
        assert_eq!(out.collect().unwrap(), b"/\na\n");
    }
}
