use crate::config::judge::JudgeConfig;
use crate::config::types::Language;
use crate::judge::adapter::JudgeAdapter;
use crate::judge::languages::{cpp::CppAdapter, java::JavaAdapter, python::PythonAdapter};

/// Adapter for `language`, built from the configured toolchain
pub fn adapter_for(language: Language, config: &JudgeConfig) -> Box<dyn JudgeAdapter> {
    let toolchain = config.toolchain(language).clone();
    match language {
        Language::Interpreted => Box::new(PythonAdapter::new(toolchain)),
        Language::NativeCompiled => Box::new(CppAdapter::new(toolchain)),
        Language::ManagedRuntime => Box::new(JavaAdapter::new(toolchain)),
    }
}
