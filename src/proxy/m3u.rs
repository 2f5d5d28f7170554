use crate::models::Channel;
use crate::utils::url::join_url;

pub const M3U_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// Build an M3U playlist of every channel that has an HLS URL.
///
/// `tvg-id` matches the XMLTV channel id so players can link the two. Logos
/// prefer the public URL and otherwise resolve the stored logo path against
/// `base_url`.
pub fn render(channels: &[Channel], base_url: &str) -> String {
    let mut m3u = String::from("#EXTM3U\n");

    for channel in channels {
        let Some(stream_url) = channel.content_urls.hls_fp.as_deref() else {
            continue;
        };

        let mut extinf = format!("#EXTINF:-1 tvg-id=\"{}\"", channel.id);
        if let Some(number) = channel.number {
            extinf.push_str(&format!(" tvg-chno=\"{}\"", number));
        }

        let logo = channel
            .logo_public_url
            .clone()
            .or_else(|| channel.logo_url.as_deref().map(|path| join_url(base_url, path)));
        if let Some(logo) = logo {
            extinf.push_str(&format!(" tvg-logo=\"{}\"", logo));
        }

        let name = channel
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| channel.label());
        extinf.push_str(&format!(",{}\n", name));

        m3u.push_str(&extinf);
        m3u.push_str(&format!("{}\n", stream_url));
    }

    m3u
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_playlist() {
        let channels: Vec<Channel> = serde_json::from_value(json!([
            {
                "id": 1, "number": 7, "displayName": "Siete",
                "logoUrl": "/image/1",
                "contentUrls": {"hlsFP": "https://cdn.example/7.m3u8"}
            },
            {
                "id": 2, "name": "Dos",
                "logoPublicUrl": "https://cdn.example/2.png",
                "contentUrls": {"hlsFP": "https://cdn.example/2.m3u8"}
            },
            {"id": 3, "name": "Sin stream", "contentUrls": {"dash": "https://cdn.example/3.mpd"}}
        ]))
        .unwrap();

        let m3u = render(&channels, "http://localhost:8080/");
        let lines: Vec<&str> = m3u.lines().collect();

        assert_eq!(
            lines,
            vec![
                "#EXTM3U",
                "#EXTINF:-1 tvg-id=\"1\" tvg-chno=\"7\" tvg-logo=\"http://localhost:8080/image/1\",Siete",
                "https://cdn.example/7.m3u8",
                "#EXTINF:-1 tvg-id=\"2\" tvg-logo=\"https://cdn.example/2.png\",Dos",
                "https://cdn.example/2.m3u8",
            ]
        );
    }
}
