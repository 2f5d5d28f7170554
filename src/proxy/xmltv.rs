use quick_xml::escape::escape;

use super::ChannelWithGuide;
use crate::models::GuideSource;
use crate::utils::time::format_xmltv_time;
use crate::utils::url::join_url;

/// Render channels and their programmes as an XMLTV document.
///
/// All `<channel>` elements come first, followed by every `<programme>`.
/// Programme icons are resolved against the mirror that supplied the guide;
/// placeholder guides carry no icons.
pub fn render(entries: &[ChannelWithGuide], generator_name: &str) -> String {
    let mut xml = String::with_capacity(entries.len() * 2048);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n");
    xml.push_str(&format!(
        "<tv generator-info-name=\"{}\">\n",
        escape(generator_name)
    ));

    for ChannelWithGuide { channel, .. } in entries {
        xml.push_str(&format!("  <channel id=\"{}\">\n", channel.id));
        xml.push_str(&format!(
            "    <display-name>{}</display-name>\n",
            escape(&channel.label())
        ));
        if let Some(number) = channel.number {
            xml.push_str(&format!("    <display-name>{}</display-name>\n", number));
        }
        if let Some(logo) = &channel.logo_public_url {
            xml.push_str(&format!("    <icon src=\"{}\" />\n", escape(logo)));
        }
        xml.push_str("  </channel>\n");
    }

    for ChannelWithGuide { channel, guide } in entries {
        for program in &guide.programs {
            xml.push_str(&format!(
                "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
                format_xmltv_time(&program.start_time),
                format_xmltv_time(&program.end_time),
                channel.id
            ));
            xml.push_str(&format!(
                "    <title lang=\"es\">{}</title>\n",
                escape(&program.title)
            ));
            if let Some(description) = program.description.as_deref().filter(|d| !d.is_empty()) {
                xml.push_str(&format!(
                    "    <desc lang=\"es\">{}</desc>\n",
                    escape(description)
                ));
            }
            if let Some(rating) = program.rating() {
                xml.push_str("    <rating system=\"TV Parental Guidelines\">\n");
                xml.push_str(&format!("      <value>{}</value>\n", escape(rating)));
                xml.push_str("    </rating>\n");
            }
            if let (GuideSource::Mirror(mirror), Some(image)) = (&guide.source, &program.image_url)
            {
                if !program.is_placeholder() {
                    xml.push_str(&format!(
                        "    <icon src=\"{}\" />\n",
                        escape(&join_url(mirror, image))
                    ));
                }
            }
            xml.push_str("  </programme>\n");
        }
    }

    xml.push_str("</tv>\n");
    xml
}
