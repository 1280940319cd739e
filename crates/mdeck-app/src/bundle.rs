//! Turn an imported `.app` directory or `.apk` file into an [`AppBundle`]

use std::path::Path;
use std::sync::Arc;

use mdeck_core::prelude::*;
use mdeck_core::{AppBundle, Platform};
use mdeck_daemon::commands::inspect;
use mdeck_daemon::packages::{
    is_xml_plist, parse_aapt_label, parse_aapt_package, parse_apkanalyzer_package,
    parse_json_plist, parse_xml_plist, PlistInfo,
};
use mdeck_daemon::ProcessRunner;

const INFO_PLIST: &str = "Info.plist";

pub struct AppBundleInspector<R> {
    runner: Arc<R>,
}

impl<R: ProcessRunner + Sync + 'static> AppBundleInspector<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Inspect `path`; the extension decides the platform
    ///
    /// Blocks on the inspection tools, so call from a blocking context.
    pub fn inspect(&self, path: &Path) -> Result<AppBundle> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("app") => self.inspect_app(path),
            Some("apk") => self.inspect_apk(path),
            _ => Err(Error::unsupported_format(path)),
        }
    }

    fn inspect_app(&self, path: &Path) -> Result<AppBundle> {
        if !path.is_dir() {
            return Err(Error::invalid_bundle(path, "not an .app directory"));
        }

        let plist_path = path.join(INFO_PLIST);
        let bytes = std::fs::read(&plist_path)
            .map_err(|e| Error::invalid_bundle(path, format!("cannot read Info.plist: {}", e)))?;
        let info = if is_xml_plist(&bytes) {
            parse_xml_plist(&String::from_utf8_lossy(&bytes))
        } else {
            self.convert_binary_plist(path, &plist_path)?
        };

        let id = info
            .bundle_identifier
            .clone()
            .ok_or_else(|| Error::invalid_bundle(path, "missing CFBundleIdentifier"))?;
        let executable_name = info
            .executable
            .clone()
            .ok_or_else(|| Error::invalid_bundle(path, "missing CFBundleExecutable"))?;
        let display_name = info
            .represented_name()
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(path));

        debug!("Inspected iOS bundle {} at {:?}", id, path);
        Ok(AppBundle {
            id,
            platform: Platform::IOS,
            display_name,
            executable_name,
            path: path.to_path_buf(),
        })
    }

    fn convert_binary_plist(&self, bundle: &Path, plist: &Path) -> Result<PlistInfo> {
        let json = self
            .runner
            .run_sync(&inspect::plist_to_json(plist))
            .map_err(|e| Error::invalid_bundle(bundle, format!("cannot convert Info.plist: {}", e)))?;
        parse_json_plist(&json)
            .ok_or_else(|| Error::invalid_bundle(bundle, "Info.plist is not a dictionary"))
    }

    fn inspect_apk(&self, path: &Path) -> Result<AppBundle> {
        if !path.is_file() {
            return Err(Error::invalid_bundle(path, "not an .apk file"));
        }

        let mut badging = None;
        let package = match self.apkanalyzer_package(path) {
            Some(package) => package,
            None => {
                let output = self.runner.run_sync(&inspect::aapt_badging(path))?;
                let package = parse_aapt_package(&output).ok_or_else(|| {
                    Error::invalid_bundle(path, "package name not found in aapt output")
                })?;
                badging = Some(output);
                package
            }
        };

        let display_name = badging
            .as_deref()
            .and_then(parse_aapt_label)
            .unwrap_or_else(|| file_stem(path));

        debug!("Inspected APK {} at {:?}", package, path);
        Ok(AppBundle {
            executable_name: package.clone(),
            id: package,
            platform: Platform::Android,
            display_name,
            path: path.to_path_buf(),
        })
    }

    fn apkanalyzer_package(&self, path: &Path) -> Option<String> {
        match self.runner.run_sync(&inspect::apk_application_id(path)) {
            Ok(output) => parse_apkanalyzer_package(&output),
            Err(e) => {
                debug!("apkanalyzer failed for {:?}, falling back to aapt: {}", path, e);
                None
            }
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
