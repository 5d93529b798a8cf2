//! Browser-friendly XSL stylesheet for sitemap and sitemap index documents.

use indoc::indoc;

/// Path the stylesheet is served and written under.
pub const STYLESHEET_PATH: &str = "/__sitemap__/style.xsl";

const STYLESHEET: &str = indoc! {r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <xsl:stylesheet version="2.0"
        xmlns:html="http://www.w3.org/TR/REC-html40"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"
        xmlns:sitemap="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
      <xsl:output method="html" version="1.0" encoding="UTF-8" indent="yes"/>
      <xsl:template match="/">
        <html xmlns="http://www.w3.org/1999/xhtml">
          <head>
            <title>XML Sitemap</title>
            <meta http-equiv="Content-Type" content="text/html; charset=utf-8"/>
            <style type="text/css">
              body { font-family: -apple-system, sans-serif; color: #333; margin: 0; }
              #content { margin: 0 auto; padding: 2rem; max-width: 960px; }
              table { border: none; border-collapse: collapse; width: 100%; }
              th { text-align: left; padding-right: 30px; font-size: 13px; }
              td { font-size: 13px; padding: 6px 30px 6px 0; border-bottom: 1px solid #eee; }
              tr:hover td { background: #f7f7f7; }
              a { color: #05809e; text-decoration: none; }
              .count { font-size: 14px; color: #777; }
            </style>
          </head>
          <body>
            <div id="content">
              <h1>XML Sitemap</h1>
              <xsl:if test="count(sitemap:sitemapindex/sitemap:sitemap) &gt; 0">
                <p class="count">
                  This index contains <xsl:value-of select="count(sitemap:sitemapindex/sitemap:sitemap)"/> sitemaps.
                </p>
                <table>
                  <thead>
                    <tr>
                      <th width="75%">Sitemap</th>
                      <th width="25%">Last Modified</th>
                    </tr>
                  </thead>
                  <tbody>
                    <xsl:for-each select="sitemap:sitemapindex/sitemap:sitemap">
                      <xsl:variable name="sitemapURL">
                        <xsl:value-of select="sitemap:loc"/>
                      </xsl:variable>
                      <tr>
                        <td><a href="{$sitemapURL}"><xsl:value-of select="sitemap:loc"/></a></td>
                        <td><xsl:value-of select="sitemap:lastmod"/></td>
                      </tr>
                    </xsl:for-each>
                  </tbody>
                </table>
              </xsl:if>
              <xsl:if test="count(sitemap:sitemapindex/sitemap:sitemap) &lt; 1">
                <p class="count">
                  This sitemap contains <xsl:value-of select="count(sitemap:urlset/sitemap:url)"/> URLs.
                </p>
                <table>
                  <thead>
                    <tr>
                      <th width="60%">URL</th>
                      <th width="10%">Images</th>
                      <th width="10%">Priority</th>
                      <th width="10%">Change Freq.</th>
                      <th width="10%">Last Modified</th>
                    </tr>
                  </thead>
                  <tbody>
                    <xsl:for-each select="sitemap:urlset/sitemap:url">
                      <xsl:variable name="itemURL">
                        <xsl:value-of select="sitemap:loc"/>
                      </xsl:variable>
                      <tr>
                        <td><a href="{$itemURL}"><xsl:value-of select="sitemap:loc"/></a></td>
                        <td><xsl:value-of select="count(image:image)"/></td>
                        <td><xsl:value-of select="sitemap:priority"/></td>
                        <td><xsl:value-of select="sitemap:changefreq"/></td>
                        <td><xsl:value-of select="sitemap:lastmod"/></td>
                      </tr>
                    </xsl:for-each>
                  </tbody>
                </table>
              </xsl:if>
            </div>
          </body>
        </html>
      </xsl:template>
    </xsl:stylesheet>
"#};

/// The stylesheet referenced by generated sitemaps' `xml-stylesheet` instruction.
pub fn generate_xsl_stylesheet() -> &'static str {
    STYLESHEET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_is_xsl() {
        let xsl = generate_xsl_stylesheet();
        assert!(xsl.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xsl.contains("xmlns:sitemap=\"http://www.sitemaps.org/schemas/sitemap/0.9\""));
        assert!(xsl.trim_end().ends_with("</xsl:stylesheet>"));
    }
}
