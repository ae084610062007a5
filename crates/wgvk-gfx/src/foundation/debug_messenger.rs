use std::ffi::CStr;

use ash::vk;

/// validation layer 消息转发到 `log`
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> Result<Self, vk::Result> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = Self::create_info(severity);
        let handle = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(Self { loader, handle })
    }

    /// 用于创建 debug messenger 的结构体
    pub fn create_info(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    ) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }

    /// 把配置里的等级名转换为 severity flags，无法识别的名字会被忽略
    pub fn severity_from_names<S: AsRef<str>>(names: &[S]) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        names.iter().fold(vk::DebugUtilsMessageSeverityFlagsEXT::empty(), |acc, name| {
            acc | match name.as_ref().to_ascii_lowercase().as_str() {
                "verbose" => vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
                "info" => vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
                "warning" | "warn" => vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                "error" => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                _ => vk::DebugUtilsMessageSeverityFlagsEXT::empty(),
            }
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        log::info!("destroying debug messenger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.handle, None);
        }
    }
}

/// 把一条 validation 消息整理成可读的文本
///
/// 新版本 validation layer 的消息是 json，其中 MainMessage 字段带换行，需要单独输出
fn format_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let mut json_obj = json_value.as_mut().ok().and_then(|v| v.as_object_mut());
    let main_msg_value = json_obj.as_mut().and_then(|obj| obj.remove("MainMessage"));
    let main_msg_str = main_msg_value.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let total_msg_str =
        json_obj.and_then(|obj| serde_json::to_string_pretty(&obj).ok()).unwrap_or_else(|| msg.to_string());

    format!("[{:?}]\n{}\n{}", message_type, total_msg_str, main_msg_str)
}

/// debug messenger 的回调函数
/// # Safety
/// 由驱动调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let msg = if p_callback_data.is_null() || unsafe { (*p_callback_data).p_message.is_null() } {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr((*p_callback_data).p_message).to_string_lossy() }
    };

    let format_msg = format_message(message_type, msg.as_ref());

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("{}", format_msg),
        _ => log::debug!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_names() {
        let flags = DebugMessenger::severity_from_names(&["Warning", "error", "nonsense"]);
        assert_eq!(
            flags,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        );
        assert!(DebugMessenger::severity_from_names::<&str>(&[]).is_empty());
    }

    #[test]
    fn json_main_message_is_split_out() {
        let text = format_message(
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            r#"{"MainMessage":"line one\nline two","MessageID":42}"#,
        );
        assert!(text.contains("\"MessageID\": 42"));
        assert!(text.ends_with("line one\nline two"));
        assert!(!text.contains("MainMessage"));
    }

    #[test]
    fn plain_message_passes_through() {
        let text = format_message(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "plain text");
        assert!(text.contains("plain text"));
    }
}
