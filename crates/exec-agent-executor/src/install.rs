//! Recognizing package installs in cell output.
//!
//! The orchestrator matches on the exact messages below, so every marker
//! is compared byte for byte.

/// Cells containing this text are treated as package installs.
pub const INSTALL_COMMAND: &str = "pip install";
pub const INSTALLED_MARKER: &str = "Successfully installed";
pub const RESTART_NOTE: &str = "Note: you may need to restart the kernel to use updated packages.";
pub const ALREADY_SATISFIED_PREFIX: &str = "Requirement already satisfied: ";

/// Kernel restart snippet and the output it prints on success.
pub const RESTART_KERNEL_CODE: &str =
    "import IPython\nIPython.Application.instance().kernel.do_shutdown(True)";
pub const RESTART_OK_MARKER: &str = "{'status': 'ok', 'restart': True}";

pub const PACKAGE_INSTALLED_MESSAGE: &str = "[Package installed successfully]";
pub const KERNEL_RESTARTED_NOTE: &str = "\n[Kernel restarted successfully to load the package]";
pub const KERNEL_RESTART_FAILED_NOTE: &str =
    "\n[But failed to restart the kernel to load the package]";
pub const PACKAGE_ALREADY_INSTALLED_MESSAGE: &str = "[Package already installed]";

/// What a cell's output says about a package install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The cell is not an install, or the output matched no marker.
    Unrecognized,
    /// Packages were installed; the kernel may need a restart.
    Installed { needs_restart: bool },
    /// The single requested package was already present.
    AlreadySatisfied { package: String },
}

/// Package arguments of an install cell: everything after the second
/// space-separated token.
#[must_use]
pub fn requested_packages(code: &str) -> &str {
    code.splitn(3, ' ').last().unwrap_or(code)
}

/// Classify the output of `code`.
#[must_use]
pub fn classify_install_output(code: &str, output: &str) -> InstallOutcome {
    if !code.contains(INSTALL_COMMAND) {
        return InstallOutcome::Unrecognized;
    }

    if output.contains(INSTALLED_MARKER) {
        return InstallOutcome::Installed {
            needs_restart: output.contains(RESTART_NOTE),
        };
    }

    let packages = requested_packages(code);
    let single_package = !packages.contains(' ');
    if single_package && output.contains(&format!("{ALREADY_SATISFIED_PREFIX}{packages}")) {
        return InstallOutcome::AlreadySatisfied {
            package: packages.to_string(),
        };
    }

    InstallOutcome::Unrecognized
}

/// Whether the restart snippet's output reports success.
#[must_use]
pub fn restart_succeeded(output: &str) -> bool {
    output.trim() == RESTART_OK_MARKER
}
