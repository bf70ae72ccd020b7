//! 用户档案：会话开始时提供，循环内只读

use serde::{Deserialize, Serialize};

/// 路线图输出语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    Pt,
}

impl Language {
    /// 用于提示词的语言全名
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::Pt => "Portuguese",
        }
    }

    /// 语言代码（与序列化形式一致）
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::Pt => "pt",
        }
    }

    /// 解析语言代码；未知代码回落到英语
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "es" => Language::Es,
            "fr" => Language::Fr,
            "pt" => Language::Pt,
            _ => Language::En,
        }
    }
}

/// 技术移民用户档案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub country: String,
    pub profession: String,
    pub education_level: String,
    pub years_experience: u32,
    /// 目标执业地区（如 Quebec）
    pub jurisdiction: String,
    #[serde(default)]
    pub language: Language,
}

impl UserProfile {
    /// 解析 JSON 档案；档案未给出 language 时使用 default_language
    pub fn from_json(data: &str, default_language: Language) -> serde_json::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(data)?;
        if let Some(fields) = value.as_object_mut() {
            fields
                .entry("language")
                .or_insert_with(|| serde_json::Value::String(default_language.code().to_string()));
        }
        serde_json::from_value(value)
    }

    /// 第一步的初始检索查询，完全由档案字段决定
    pub fn initial_query(&self) -> String {
        format!(
            "{} licensing requirements in {} for internationally trained professionals from {}",
            self.profession.trim(),
            self.jurisdiction.trim(),
            self.country.trim()
        )
    }
}
