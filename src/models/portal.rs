/// 门户页面布局
///
/// 所有选择器集中在这里，流程层只按名字引用，不关心 DOM 结构。
#[derive(Debug, Clone)]
pub struct PortalLayout {
    /// 下拉框未加载时显示的占位文本
    pub placeholder_text: String,
    pub location_field: String,
    pub year_field: String,
    pub court_type_field: String,
    pub specialty_field: String,
    pub file_number_field: String,
    pub captcha_image: String,
    pub captcha_reload: String,
    pub captcha_hidden_answer: String,
    pub captcha_input: String,
    pub submit_button: String,
    /// 验证码错误提示
    pub captcha_error: String,
    /// "没有记录" 提示
    pub no_records: String,
    /// 结果列表容器
    pub results_marker: String,
    /// 每个案件一个按钮
    pub case_buttons: String,
    /// 案件详情页加载完成的标志
    pub case_detail_marker: String,
    pub case_title: String,
    pub document_links: String,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            placeholder_text: "--SELECCIONAR".to_string(),
            location_field: "#distritoJudicial".to_string(),
            year_field: "#anio".to_string(),
            court_type_field: "#organoJurisdiccional".to_string(),
            specialty_field: "#especialidad".to_string(),
            file_number_field: "#numeroExpediente".to_string(),
            captcha_image: "#captcha_image".to_string(),
            captcha_reload: "#btnReload".to_string(),
            captcha_hidden_answer: "[id='1zirobotz0']".to_string(),
            captcha_input: "#codigoCaptcha".to_string(),
            submit_button: "#consultarExpedientes".to_string(),
            captcha_error: "#codCaptchaError".to_string(),
            no_records: "#mensajeNoExisteExpedientes".to_string(),
            results_marker: "div.celdCentro".to_string(),
            case_buttons: "div.celdCentro form button".to_string(),
            case_detail_marker: "div.partes".to_string(),
            case_title: "div.celdaGrid.celdaGridXe".to_string(),
            document_links: "a.aDescarg".to_string(),
        }
    }
}
